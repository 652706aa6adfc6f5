use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{GenerationConfig, MIN_SECTOR_COUNT};
use crate::features::{FeatureKind, SectorFeature};
use crate::graph::{SectorId, WarpGraph, WarpLink, ENTRY_SECTOR};
use crate::hashing;
use crate::placement::{FeaturePlacement, PlacementReport};
use crate::repair::RepairReport;

/// Configuration plus the seed that was actually used.
#[derive(Debug, Clone, PartialEq, Hash, Serialize, Deserialize)]
pub struct GenerationParams {
    pub config: GenerationConfig,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sector {
    id: SectorId,
    neighbors: Vec<SectorId>,
    feature: Option<SectorFeature>,
}

impl Sector {
    pub fn id(&self) -> SectorId {
        self.id
    }

    /// Linked sectors, ascending.
    pub fn neighbors(&self) -> &[SectorId] {
        &self.neighbors
    }

    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    pub fn feature(&self) -> Option<&SectorFeature> {
        self.feature.as_ref()
    }

    pub fn feature_kind(&self) -> Option<FeatureKind> {
        self.feature.as_ref().map(SectorFeature::kind)
    }
}

/// Soft degradations recorded on an otherwise valid universe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationWarning {
    SpawnSeparationRelaxed { sites: u32, separation: u32 },
    PortShortfall { requested: u32, placed: u32 },
    PlanetShortfall { requested: u32, placed: u32 },
    DeadEndsRemaining { sectors: Vec<SectorId> },
}

impl fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationWarning::SpawnSeparationRelaxed { sites, separation } => write!(
                f,
                "{sites} spawn site(s) placed within {separation} warps of another"
            ),
            GenerationWarning::PortShortfall { requested, placed } => {
                write!(f, "placed {placed} of {requested} requested ports")
            }
            GenerationWarning::PlanetShortfall { requested, placed } => {
                write!(f, "placed {placed} of {requested} requested planets")
            }
            GenerationWarning::DeadEndsRemaining { sectors } => {
                write!(f, "{} dead-end sector(s) left unresolved", sectors.len())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationReport {
    pub warnings: Vec<GenerationWarning>,
    pub repair: RepairReport,
    pub placement: PlacementReport,
}

impl GenerationReport {
    fn from_stages(
        params: &GenerationParams,
        repair: RepairReport,
        placement: PlacementReport,
    ) -> Self {
        let mut warnings = Vec::new();
        if placement.spawn_sites_relaxed > 0 {
            warnings.push(GenerationWarning::SpawnSeparationRelaxed {
                sites: placement.spawn_sites_relaxed,
                separation: params.config.spawn_separation,
            });
        }
        if placement.ports_placed < placement.ports_requested {
            warnings.push(GenerationWarning::PortShortfall {
                requested: placement.ports_requested,
                placed: placement.ports_placed,
            });
        }
        if placement.planets_placed < placement.planets_requested {
            warnings.push(GenerationWarning::PlanetShortfall {
                requested: placement.planets_requested,
                placed: placement.planets_placed,
            });
        }
        if !params.config.allow_dead_ends && !repair.dead_ends_remaining.is_empty() {
            warnings.push(GenerationWarning::DeadEndsRemaining {
                sectors: repair.dead_ends_remaining.clone(),
            });
        }
        Self {
            warnings,
            repair,
            placement,
        }
    }

    pub fn has_port_shortfall(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, GenerationWarning::PortShortfall { .. }))
    }
}

/// A fully generated universe. Read-only once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    params: GenerationParams,
    sectors: Vec<Sector>,
    links: Vec<WarpLink>,
    report: GenerationReport,
    generated_at_ms: u64,
    fingerprint: u64,
}

impl Universe {
    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.params.seed
    }

    pub fn sector_count(&self) -> u32 {
        self.sectors.len() as u32
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn sector(&self, id: SectorId) -> Option<&Sector> {
        id.checked_sub(1)
            .and_then(|slot| self.sectors.get(slot as usize))
    }

    /// Undirected links in ascending order.
    pub fn links(&self) -> &[WarpLink] {
        &self.links
    }

    pub fn report(&self) -> &GenerationReport {
        &self.report
    }

    pub fn warnings(&self) -> &[GenerationWarning] {
        &self.report.warnings
    }

    pub fn generated_at_ms(&self) -> u64 {
        self.generated_at_ms
    }

    /// Hash over parameters, sectors and links. Two universes generated from
    /// the same config and seed share a fingerprint.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn count(&self, kind: FeatureKind) -> usize {
        self.sectors
            .iter()
            .filter(|sector| sector.feature_kind() == Some(kind))
            .count()
    }

    pub fn sectors_with(&self, kind: FeatureKind) -> Vec<SectorId> {
        self.sectors
            .iter()
            .filter(|sector| sector.feature_kind() == Some(kind))
            .map(Sector::id)
            .collect()
    }

    /// Feature assignments only, keyed by sector.
    pub fn feature_map(&self) -> BTreeMap<SectorId, &SectorFeature> {
        self.sectors
            .iter()
            .filter_map(|sector| sector.feature().map(|feature| (sector.id, feature)))
            .collect()
    }

    pub fn dead_ends(&self) -> Vec<SectorId> {
        self.sectors
            .iter()
            .filter(|sector| sector.degree() == 1)
            .map(Sector::id)
            .collect()
    }

    pub fn average_degree(&self) -> f32 {
        if self.sectors.is_empty() {
            0.0
        } else {
            (2 * self.links.len()) as f32 / self.sectors.len() as f32
        }
    }
}

// The generation timestamp is left out so replays fingerprint identically.
fn compute_fingerprint(params: &GenerationParams, sectors: &[Sector], links: &[WarpLink]) -> u64 {
    hashing::fingerprint(&(params, sectors, links))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("universe has {found} sector(s), below the minimum of {minimum}")]
    TooFewSectors { found: u32, minimum: u32 },
    #[error("expected {expected} sectors with dense ids, found {found} (first mismatch at position {position})")]
    SectorIdsNotDense {
        expected: u32,
        found: u32,
        position: usize,
    },
    #[error("link {low}-{high} is a self loop")]
    SelfLoop { low: SectorId, high: SectorId },
    #[error("link {low}-{high} references a sector outside 1..={sector_count}")]
    UnknownSector {
        low: SectorId,
        high: SectorId,
        sector_count: u32,
    },
    #[error("link {low}-{high} appears more than once")]
    DuplicateLink { low: SectorId, high: SectorId },
    #[error("neighbour list of sector {sector} disagrees with the link set")]
    AsymmetricLink { sector: SectorId },
    #[error("{} sector(s) unreachable from sector 1: {unreachable:?}", unreachable.len())]
    Disconnected { unreachable: Vec<SectorId> },
    #[error("sectors without any warp link: {sectors:?}")]
    IsolatedSectors { sectors: Vec<SectorId> },
    #[error("unreported dead-end sectors: {sectors:?}")]
    DeadEnds { sectors: Vec<SectorId> },
    #[error("entry sector carries a {feature}")]
    EntrySectorOccupied { feature: FeatureKind },
    #[error("entry sector has {degree} warp(s), expected at least 2")]
    EntrySectorUnderLinked { degree: usize },
    #[error("expected {expected} {feature}(s), found {actual}")]
    FeatureCountMismatch {
        feature: FeatureKind,
        expected: u32,
        actual: u32,
    },
    #[error("feature assigned to sector {sector}, which does not exist")]
    FeatureOutsideUniverse { sector: SectorId },
    #[error("stored fingerprint {stored:#018x} does not match computed {computed:#018x}")]
    FingerprintMismatch { stored: u64, computed: u64 },
}

impl InvariantViolation {
    /// Short name of the failed check, for logs.
    pub fn check(&self) -> &'static str {
        match self {
            InvariantViolation::TooFewSectors { .. } => "sector_count",
            InvariantViolation::SectorIdsNotDense { .. } => "dense_ids",
            InvariantViolation::SelfLoop { .. }
            | InvariantViolation::UnknownSector { .. }
            | InvariantViolation::DuplicateLink { .. }
            | InvariantViolation::AsymmetricLink { .. } => "simple_graph",
            InvariantViolation::Disconnected { .. } => "connectivity",
            InvariantViolation::IsolatedSectors { .. } | InvariantViolation::DeadEnds { .. } => {
                "degree"
            }
            InvariantViolation::EntrySectorOccupied { .. }
            | InvariantViolation::EntrySectorUnderLinked { .. } => "entry_sector",
            InvariantViolation::FeatureCountMismatch { .. }
            | InvariantViolation::FeatureOutsideUniverse { .. } => "feature_counts",
            InvariantViolation::FingerprintMismatch { .. } => "fingerprint",
        }
    }
}

/// Combines the pipeline stages into a [`Universe`] and runs the full
/// invariant check on the result.
pub fn assemble(
    params: GenerationParams,
    graph: WarpGraph,
    repair: RepairReport,
    placement: FeaturePlacement,
    generated_at_ms: u64,
) -> Result<Universe, InvariantViolation> {
    let links = graph.links();
    let sector_count = graph.sector_count();
    let (mut assignments, placement_report) = placement.into_parts();

    let sectors: Vec<Sector> = graph
        .into_adjacency()
        .into_iter()
        .enumerate()
        .map(|(slot, neighbors)| {
            let id = slot as SectorId + 1;
            Sector {
                id,
                neighbors: neighbors.into_iter().collect(),
                feature: assignments.remove(&id),
            }
        })
        .collect();

    if let Some((&sector, _)) = assignments.iter().next() {
        return Err(log_violation(InvariantViolation::FeatureOutsideUniverse { sector }));
    }

    let report = GenerationReport::from_stages(&params, repair, placement_report);
    let fingerprint = compute_fingerprint(&params, &sectors, &links);
    let universe = Universe {
        params,
        sectors,
        links,
        report,
        generated_at_ms,
        fingerprint,
    };

    verify_universe(&universe).map_err(log_violation)?;
    tracing::debug!(
        target: "universe_gen::assembly",
        sectors = sector_count,
        links = universe.links.len(),
        fingerprint = format_args!("{:016x}", fingerprint),
        "assembly.verified"
    );
    Ok(universe)
}

fn log_violation(violation: InvariantViolation) -> InvariantViolation {
    tracing::error!(
        target: "universe_gen::assembly",
        check = violation.check(),
        detail = %violation,
        "assembly.invariant_violation"
    );
    violation
}

/// Runs every structural check on `universe`.
pub fn verify_universe(universe: &Universe) -> Result<(), InvariantViolation> {
    let config = &universe.params.config;
    let expected = config.sector_count;

    let found = universe.sector_count();
    if found < MIN_SECTOR_COUNT || expected < MIN_SECTOR_COUNT {
        return Err(InvariantViolation::TooFewSectors {
            found: found.min(expected),
            minimum: MIN_SECTOR_COUNT,
        });
    }

    // Dense ids.
    let mismatch = universe
        .sectors
        .iter()
        .enumerate()
        .position(|(slot, sector)| sector.id != slot as SectorId + 1);
    if found != expected || mismatch.is_some() {
        return Err(InvariantViolation::SectorIdsNotDense {
            expected,
            found,
            position: mismatch.unwrap_or(found.min(expected) as usize),
        });
    }

    // Simple graph, mirrored in the neighbour lists.
    let mut graph = WarpGraph::with_sectors(found);
    for link in &universe.links {
        let (low, high) = link.endpoints();
        if link.is_self_loop() {
            return Err(InvariantViolation::SelfLoop { low, high });
        }
        if !graph.contains(low) || !graph.contains(high) {
            return Err(InvariantViolation::UnknownSector {
                low,
                high,
                sector_count: found,
            });
        }
        if !graph.add_link(low, high) {
            return Err(InvariantViolation::DuplicateLink { low, high });
        }
    }
    for sector in &universe.sectors {
        if !sector.neighbors.iter().copied().eq(graph.neighbors(sector.id)) {
            return Err(InvariantViolation::AsymmetricLink { sector: sector.id });
        }
    }

    // Connectivity and degree.
    let reached = graph.reachable_from(ENTRY_SECTOR);
    let unreachable: Vec<SectorId> = graph
        .sectors()
        .filter(|&s| !reached[(s - 1) as usize])
        .collect();
    if !unreachable.is_empty() {
        return Err(InvariantViolation::Disconnected { unreachable });
    }
    let isolated: Vec<SectorId> = graph.sectors().filter(|&s| graph.degree(s) == 0).collect();
    if !isolated.is_empty() {
        return Err(InvariantViolation::IsolatedSectors { sectors: isolated });
    }
    if !config.allow_dead_ends {
        let accepted = &universe.report.repair.dead_ends_remaining;
        let unreported: Vec<SectorId> = graph
            .dead_ends()
            .into_iter()
            .filter(|s| !accepted.contains(s))
            .collect();
        if !unreported.is_empty() {
            return Err(InvariantViolation::DeadEnds {
                sectors: unreported,
            });
        }
    }

    // Entry sector.
    if let Some(kind) = universe.sectors.first().and_then(Sector::feature_kind) {
        return Err(InvariantViolation::EntrySectorOccupied { feature: kind });
    }
    let entry_degree = graph.degree(ENTRY_SECTOR);
    if found > 1 && entry_degree < 2 {
        return Err(InvariantViolation::EntrySectorUnderLinked {
            degree: entry_degree,
        });
    }

    // Feature counts.
    check_count(universe, FeatureKind::HubStation, config.stardock_count)?;
    check_count(universe, FeatureKind::SpawnSite, config.alien_planet_count)?;
    let placement = &universe.report.placement;
    let ports = universe.count(FeatureKind::Port) as u32;
    let port_target = config.port_target();
    let ports_ok = if universe.report.has_port_shortfall() {
        ports == placement.ports_placed
    } else {
        ports.abs_diff(port_target) <= 1
    };
    if !ports_ok {
        return Err(InvariantViolation::FeatureCountMismatch {
            feature: FeatureKind::Port,
            expected: port_target,
            actual: ports,
        });
    }
    check_count(universe, FeatureKind::Planet, placement.planets_placed)?;

    let computed = compute_fingerprint(&universe.params, &universe.sectors, &universe.links);
    if computed != universe.fingerprint {
        return Err(InvariantViolation::FingerprintMismatch {
            stored: universe.fingerprint,
            computed,
        });
    }
    Ok(())
}

fn check_count(
    universe: &Universe,
    feature: FeatureKind,
    expected: u32,
) -> Result<(), InvariantViolation> {
    let actual = universe.count(feature) as u32;
    if actual == expected {
        Ok(())
    } else {
        Err(InvariantViolation::FeatureCountMismatch {
            feature,
            expected,
            actual,
        })
    }
}
