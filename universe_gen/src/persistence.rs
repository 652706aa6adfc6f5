use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::features::{FeatureKind, PlanetClass, PortClass, SectorFeature};
use crate::graph::SectorId;
use crate::universe::{verify_universe, InvariantViolation, Universe};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to encode universe as json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to encode universe as bincode: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("failed to write universe to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read universe from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("universe {fingerprint:016x} is already persisted")]
    AlreadyPersisted { fingerprint: u64 },
    #[error("stored universe failed verification: {0}")]
    Corrupt(#[source] InvariantViolation),
    #[error("store rejected universe: {0}")]
    Rejected(String),
}

/// Receives a finished universe in a single hand-off.
pub trait UniverseStore {
    fn persist(&mut self, universe: &Universe) -> Result<(), PersistenceError>;
}

/// Keeps persisted universes in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    universes: Vec<Universe>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn universes(&self) -> &[Universe] {
        &self.universes
    }

    pub fn get(&self, fingerprint: u64) -> Option<&Universe> {
        self.universes
            .iter()
            .find(|universe| universe.fingerprint() == fingerprint)
    }

    pub fn len(&self) -> usize {
        self.universes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }

    pub fn into_universes(self) -> Vec<Universe> {
        self.universes
    }
}

impl UniverseStore for MemoryStore {
    fn persist(&mut self, universe: &Universe) -> Result<(), PersistenceError> {
        let fingerprint = universe.fingerprint();
        if self.get(fingerprint).is_some() {
            return Err(PersistenceError::AlreadyPersisted { fingerprint });
        }
        self.universes.push(universe.clone());
        tracing::debug!(
            target: "universe_gen::store",
            fingerprint = format_args!("{fingerprint:016x}"),
            stored = self.universes.len(),
            "store.memory.persisted"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFormat {
    #[default]
    Json,
    Bincode,
}

impl StoreFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StoreFormat::Json => "json",
            StoreFormat::Bincode => "bin",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(StoreFormat::Json),
            "bin" => Some(StoreFormat::Bincode),
            _ => None,
        }
    }

    fn encode(self, universe: &Universe) -> Result<Vec<u8>, PersistenceError> {
        match self {
            StoreFormat::Json => Ok(serde_json::to_vec_pretty(universe)?),
            StoreFormat::Bincode => Ok(bincode::serialize(universe)?),
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<Universe, PersistenceError> {
        match self {
            StoreFormat::Json => Ok(serde_json::from_slice(bytes)?),
            StoreFormat::Bincode => Ok(bincode::deserialize(bytes)?),
        }
    }
}

/// Writes one file per universe, named by fingerprint.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    format: StoreFormat,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, format: StoreFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> StoreFormat {
        self.format
    }

    pub fn path_for(&self, fingerprint: u64) -> PathBuf {
        self.dir.join(format!(
            "universe-{fingerprint:016x}.{}",
            self.format.extension()
        ))
    }

    pub fn load(&self, fingerprint: u64) -> Result<Universe, PersistenceError> {
        read_universe(&self.path_for(fingerprint), self.format)
    }
}

impl UniverseStore for FileStore {
    fn persist(&mut self, universe: &Universe) -> Result<(), PersistenceError> {
        let fingerprint = universe.fingerprint();
        let path = self.path_for(fingerprint);
        if path.exists() {
            return Err(PersistenceError::AlreadyPersisted { fingerprint });
        }
        let bytes = self.format.encode(universe)?;

        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let staging = path.with_extension(format!("{}.tmp", self.format.extension()));
        fs::write(&staging, &bytes).map_err(|source| PersistenceError::Write {
            path: staging.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(PersistenceError::Write { path, source });
        }

        tracing::info!(
            target: "universe_gen::store",
            path = %path.display(),
            bytes = bytes.len(),
            "store.file.persisted"
        );
        Ok(())
    }
}

/// Loads a stored universe and re-runs the invariant check on it.
pub fn read_universe(path: &Path, format: StoreFormat) -> Result<Universe, PersistenceError> {
    let bytes = fs::read(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let universe = format.decode(&bytes)?;
    verify_universe(&universe).map_err(PersistenceError::Corrupt)?;
    Ok(universe)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectorRow {
    pub sector_id: SectorId,
    pub degree: u32,
    /// Which feature table holds this sector's row, if any.
    pub feature: Option<FeatureKind>,
}

/// One row per undirected link, `sector_a < sector_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WarpLinkRow {
    pub sector_a: SectorId,
    pub sector_b: SectorId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortRow {
    pub sector_id: SectorId,
    pub class: PortClass,
    pub class_number: u8,
    pub fuel_ore: u32,
    pub organics: u32,
    pub equipment: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStationRow {
    pub sector_id: SectorId,
    pub designation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnSiteRow {
    pub sector_id: SectorId,
    pub strength: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanetRow {
    pub sector_id: SectorId,
    pub class: PlanetClass,
}

/// Relational projection of a universe, ready for bulk insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UniverseTables {
    pub sectors: Vec<SectorRow>,
    pub warp_links: Vec<WarpLinkRow>,
    pub ports: Vec<PortRow>,
    pub hub_stations: Vec<HubStationRow>,
    pub spawn_sites: Vec<SpawnSiteRow>,
    pub planets: Vec<PlanetRow>,
}

impl Universe {
    pub fn tables(&self) -> UniverseTables {
        let mut tables = UniverseTables {
            sectors: Vec::with_capacity(self.sectors().len()),
            warp_links: Vec::with_capacity(self.links().len()),
            ..UniverseTables::default()
        };

        for sector in self.sectors() {
            let sector_id = sector.id();
            tables.sectors.push(SectorRow {
                sector_id,
                degree: sector.degree() as u32,
                feature: sector.feature_kind(),
            });
            match sector.feature() {
                Some(SectorFeature::Port(port)) => tables.ports.push(PortRow {
                    sector_id,
                    class: port.class,
                    class_number: port.class.number(),
                    fuel_ore: port.stock.fuel_ore,
                    organics: port.stock.organics,
                    equipment: port.stock.equipment,
                }),
                Some(SectorFeature::HubStation(hub)) => tables.hub_stations.push(HubStationRow {
                    sector_id,
                    designation: hub.designation.clone(),
                }),
                Some(SectorFeature::SpawnSite(site)) => tables.spawn_sites.push(SpawnSiteRow {
                    sector_id,
                    strength: site.strength,
                }),
                Some(SectorFeature::Planet(planet)) => tables.planets.push(PlanetRow {
                    sector_id,
                    class: planet.class,
                }),
                None => {}
            }
        }

        tables.warp_links.extend(self.links().iter().map(|link| WarpLinkRow {
            sector_a: link.low(),
            sector_b: link.high(),
        }));
        tables
    }
}
