use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{FeatureWeighting, GenerationConfig, Weighting};
use crate::features::{FeatureKind, HubStation, Planet, Port, SectorFeature, SpawnSite};
use crate::graph::{SectorId, WarpGraph, ENTRY_SECTOR};
use crate::rng::RandomStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementTargets {
    pub hub_stations: u32,
    pub spawn_sites: u32,
    pub ports: u32,
    pub planets: u32,
    pub spawn_separation: u32,
    pub weighting: FeatureWeighting,
}

impl PlacementTargets {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            hub_stations: config.stardock_count,
            spawn_sites: config.alien_planet_count,
            ports: config.port_target(),
            planets: config.planet_target(),
            spawn_separation: config.spawn_separation,
            weighting: config.weighting,
        }
    }

    pub fn target(&self, kind: FeatureKind) -> u32 {
        match kind {
            FeatureKind::HubStation => self.hub_stations,
            FeatureKind::SpawnSite => self.spawn_sites,
            FeatureKind::Port => self.ports,
            FeatureKind::Planet => self.planets,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementReport {
    pub ports_requested: u32,
    pub ports_placed: u32,
    pub planets_requested: u32,
    pub planets_placed: u32,
    /// Spawn sites placed without honouring the separation threshold.
    pub spawn_sites_relaxed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot place {requested} {feature}(s): candidate pool exhausted after {placed}, short by {shortfall}")]
pub struct CapacityError {
    pub feature: FeatureKind,
    pub requested: u32,
    pub placed: u32,
    pub shortfall: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePlacement {
    assignments: BTreeMap<SectorId, SectorFeature>,
    report: PlacementReport,
}

impl FeaturePlacement {
    pub fn feature_at(&self, sector: SectorId) -> Option<&SectorFeature> {
        self.assignments.get(&sector)
    }

    pub fn count(&self, kind: FeatureKind) -> usize {
        self.assignments
            .values()
            .filter(|feature| feature.kind() == kind)
            .count()
    }

    pub fn sectors_with(&self, kind: FeatureKind) -> Vec<SectorId> {
        self.assignments
            .iter()
            .filter(|(_, feature)| feature.kind() == kind)
            .map(|(sector, _)| *sector)
            .collect()
    }

    pub fn report(&self) -> &PlacementReport {
        &self.report
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<SectorId, SectorFeature>, PlacementReport) {
        (self.assignments, self.report)
    }
}

/// Remaining unassigned sectors.
struct CandidatePool {
    sectors: Vec<SectorId>,
}

impl CandidatePool {
    fn new(graph: &WarpGraph) -> Self {
        Self {
            sectors: graph.sectors().filter(|&s| s != ENTRY_SECTOR).collect(),
        }
    }

    fn len(&self) -> usize {
        self.sectors.len()
    }

    fn take_at(&mut self, idx: usize) -> SectorId {
        self.sectors.swap_remove(idx)
    }

    /// Draws up to `count` sectors without replacement.
    fn draw_many(
        &mut self,
        count: usize,
        weighting: Weighting,
        graph: &WarpGraph,
        rng: &mut RandomStream,
    ) -> Vec<SectorId> {
        let count = count.min(self.sectors.len());
        if weighting == Weighting::Connectivity {
            let chosen: Result<Vec<SectorId>, _> = self
                .sectors
                .choose_multiple_weighted(rng, count, |&s| graph.degree(s).max(1) as f64)
                .map(|iter| iter.copied().collect());
            match chosen {
                Ok(chosen) => {
                    let taken: BTreeSet<SectorId> = chosen.iter().copied().collect();
                    self.sectors.retain(|s| !taken.contains(s));
                    return chosen;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "universe_gen::features",
                        error = %err,
                        "features.weighting.fallback=uniform"
                    );
                }
            }
        }
        let mut chosen = Vec::with_capacity(count);
        for _ in 0..count {
            match rng.pick_index(self.sectors.len()) {
                Some(idx) => chosen.push(self.take_at(idx)),
                None => break,
            }
        }
        chosen
    }

    /// Draws one sector among those passing `eligible`, or `None` if no
    /// candidate qualifies.
    fn draw_filtered(
        &mut self,
        weighting: Weighting,
        graph: &WarpGraph,
        rng: &mut RandomStream,
        eligible: impl Fn(SectorId) -> bool,
    ) -> Option<SectorId> {
        let indices: Vec<usize> = (0..self.sectors.len())
            .filter(|&idx| eligible(self.sectors[idx]))
            .collect();
        let pick = match weighting {
            Weighting::Uniform => rng.pick(&indices).copied(),
            Weighting::Connectivity => indices
                .choose_weighted(rng, |&idx| graph.degree(self.sectors[idx]).max(1) as f64)
                .ok()
                .copied(),
        }?;
        Some(self.take_at(pick))
    }
}

pub fn place_features(
    graph: &WarpGraph,
    targets: &PlacementTargets,
    rng: &mut RandomStream,
) -> Result<FeaturePlacement, CapacityError> {
    let mut pool = CandidatePool::new(graph);
    let mut assignments = BTreeMap::new();
    let mut report = PlacementReport {
        ports_requested: targets.ports,
        planets_requested: targets.planets,
        ..PlacementReport::default()
    };

    for kind in FeatureKind::PLACEMENT_ORDER {
        let requested = targets.target(kind);
        let weighting = targets.weighting.for_kind(kind);
        let placed = match kind {
            FeatureKind::HubStation => {
                let sectors = pool.draw_many(requested as usize, weighting, graph, rng);
                for (ordinal, sector) in sectors.iter().enumerate() {
                    let hub = HubStation::numbered(ordinal as u32);
                    assignments.insert(*sector, SectorFeature::HubStation(hub));
                }
                sectors.len() as u32
            }
            FeatureKind::SpawnSite => {
                let (placed, relaxed) =
                    place_spawn_sites(&mut pool, graph, targets, &mut assignments, rng);
                report.spawn_sites_relaxed = relaxed;
                placed
            }
            FeatureKind::Port => {
                let sectors = pool.draw_many(requested as usize, weighting, graph, rng);
                for sector in &sectors {
                    assignments.insert(*sector, SectorFeature::Port(Port::sample(rng)));
                }
                report.ports_placed = sectors.len() as u32;
                report.ports_placed
            }
            FeatureKind::Planet => {
                let sectors = pool.draw_many(requested as usize, weighting, graph, rng);
                for sector in &sectors {
                    assignments.insert(*sector, SectorFeature::Planet(Planet::sample(rng)));
                }
                report.planets_placed = sectors.len() as u32;
                report.planets_placed
            }
        };

        if placed < requested {
            if kind.is_hard_count() {
                let err = CapacityError {
                    feature: kind,
                    requested,
                    placed,
                    shortfall: requested - placed,
                };
                tracing::warn!(
                    target: "universe_gen::features",
                    feature = %kind,
                    requested,
                    placed,
                    "features.capacity.exhausted"
                );
                return Err(err);
            }
            tracing::warn!(
                target: "universe_gen::features",
                feature = %kind,
                requested,
                placed,
                "features.density.partial"
            );
        }
        tracing::debug!(
            target: "universe_gen::features",
            feature = %kind,
            requested,
            placed,
            remaining_pool = pool.len(),
            "features.placed"
        );
    }

    if report.spawn_sites_relaxed > 0 {
        tracing::warn!(
            target: "universe_gen::features",
            relaxed = report.spawn_sites_relaxed,
            separation = targets.spawn_separation,
            "features.spawn_separation.relaxed"
        );
    }

    Ok(FeaturePlacement {
        assignments,
        report,
    })
}

/// Places spawn sites one at a time, preferring candidates further than the
/// separation threshold from every site placed so far. Returns
/// `(placed, relaxed)`.
fn place_spawn_sites(
    pool: &mut CandidatePool,
    graph: &WarpGraph,
    targets: &PlacementTargets,
    assignments: &mut BTreeMap<SectorId, SectorFeature>,
    rng: &mut RandomStream,
) -> (u32, u32) {
    let weighting = targets.weighting.spawn_sites;
    let threshold = targets.spawn_separation;
    let mut nearest_site = vec![u32::MAX; graph.sector_count() as usize];
    let mut separated = 0u32;

    while separated < targets.spawn_sites {
        let Some(site) = pool.draw_filtered(weighting, graph, rng, |s| {
            nearest_site[(s - 1) as usize] > threshold
        }) else {
            break;
        };
        for (sector, hops) in graph.within_hops(site, threshold) {
            let slot = (sector - 1) as usize;
            nearest_site[slot] = nearest_site[slot].min(hops);
        }
        assignments.insert(site, SectorFeature::SpawnSite(SpawnSite::sample(rng)));
        separated += 1;
    }

    // Nearest distances only shrink and the pool only empties, so once no
    // candidate clears the threshold none ever will again.
    let remaining = (targets.spawn_sites - separated) as usize;
    let crowded = pool.draw_many(remaining, weighting, graph, rng);
    for &site in &crowded {
        assignments.insert(site, SectorFeature::SpawnSite(SpawnSite::sample(rng)));
    }
    let relaxed = crowded.len() as u32;
    (separated + relaxed, relaxed)
}
