//! Procedural universe generation for the trading game.
//!
//! [`generate_universe`] runs the staged pipeline: build a warp graph, repair
//! its connectivity, place features, then assemble and verify the immutable
//! [`Universe`]. Every stage draws from one explicitly passed
//! [`RandomStream`], so a config with a fixed seed always yields the same
//! universe.

pub mod config;
pub mod features;
pub mod graph;
pub mod hashing;
pub mod persistence;
pub mod placement;
pub mod presets;
pub mod repair;
pub mod rng;
pub mod universe;
pub mod worker;

use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use thiserror::Error;

pub use config::{ConfigError, FeatureWeighting, GenerationConfig, Weighting};
pub use features::{
    Commodities, CommodityStock, FeatureKind, HubStation, Planet, PlanetClass, Port, PortClass,
    SectorFeature, SpawnSite,
};
pub use graph::{SectorId, WarpGraph, WarpLink, ENTRY_SECTOR};
pub use persistence::{
    FileStore, MemoryStore, PersistenceError, StoreFormat, UniverseStore, UniverseTables,
};
pub use placement::{CapacityError, PlacementReport};
pub use presets::{PresetsError, UniversePreset, UniversePresets};
pub use repair::RepairReport;
pub use rng::RandomStream;
pub use universe::{
    verify_universe, GenerationParams, GenerationReport, GenerationWarning, InvariantViolation,
    Sector, Universe,
};
pub use worker::{GenerationTicket, GenerationWorker, JobOutcome, WorkerError};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid generation config: {0}")]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error("generated universe violates invariant: {0}")]
    InvariantViolation(#[from] InvariantViolation),
    #[error("failed to persist universe: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("random stream for seed {seed} was already drawn from and cannot be replayed")]
    StreamAdvanced { seed: u64 },
}

/// Generate a universe, seeding the stream from `config.seed` or entropy.
pub fn generate_universe(config: &GenerationConfig) -> Result<Universe, GenerationError> {
    let mut rng = RandomStream::for_seed(config.seed);
    generate_universe_with(config, &mut rng)
}

/// Generate a universe from an injected stream.
///
/// The stream must be fresh: its seed is recorded on the result in place of
/// `config.seed`, and a stream that was already drawn from would not replay
/// from that seed.
pub fn generate_universe_with(
    config: &GenerationConfig,
    rng: &mut RandomStream,
) -> Result<Universe, GenerationError> {
    config.validate()?;
    if !rng.is_fresh() {
        return Err(GenerationError::StreamAdvanced { seed: rng.seed() });
    }
    let seed = rng.seed();

    let graph = graph::build_graph(&graph::GraphParams::from_config(config), rng)?;
    let repaired =
        repair::repair_connectivity(graph, &repair::RepairPolicy::from_config(config), rng);
    let placement = placement::place_features(
        &repaired.graph,
        &placement::PlacementTargets::from_config(config),
        rng,
    )?;

    let params = GenerationParams {
        config: GenerationConfig {
            seed: Some(seed),
            ..config.clone()
        },
        seed,
    };
    let universe = universe::assemble(
        params,
        repaired.graph,
        repaired.report,
        placement,
        now_ms(),
    )?;

    tracing::info!(
        target: "universe_gen::assembly",
        seed,
        sectors = universe.sector_count(),
        links = universe.links().len(),
        warnings = universe.warnings().len(),
        fingerprint = format_args!("{:016x}", universe.fingerprint()),
        "universe.generated"
    );
    for warning in universe.warnings() {
        tracing::warn!(target: "universe_gen::assembly", %warning, "universe.warning");
    }
    Ok(universe)
}

/// Generate a universe and hand it to `store` in a single call. Nothing is
/// stored when generation fails.
pub fn generate_and_persist<S>(
    config: &GenerationConfig,
    store: &mut S,
) -> Result<Universe, GenerationError>
where
    S: UniverseStore + ?Sized,
{
    let universe = generate_universe(config)?;
    store.persist(&universe)?;
    Ok(universe)
}

/// Generate several universes in parallel. Results keep the order of
/// `configs`; each universe has its own stream.
pub fn generate_batch(configs: &[GenerationConfig]) -> Vec<Result<Universe, GenerationError>> {
    configs.par_iter().map(generate_universe).collect()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn unseeded_runs_record_their_seed() {
        let config = GenerationConfig::with_sectors(40);
        let universe = generate_universe(&config).unwrap();
        assert_eq!(universe.params().config.seed, Some(universe.seed()));

        let replay = generate_universe(&universe.params().config).unwrap();
        assert_eq!(replay.fingerprint(), universe.fingerprint());
        assert_eq!(replay.links(), universe.links());
    }

    #[test]
    fn injected_stream_seed_wins() {
        let config = GenerationConfig::with_sectors(30).with_seed(1);
        let mut rng = RandomStream::from_seed(99);
        let universe = generate_universe_with(&config, &mut rng).unwrap();
        assert_eq!(universe.seed(), 99);
        assert_eq!(universe.params().config.seed, Some(99));
    }

    #[test]
    fn advanced_stream_is_rejected() {
        let config = GenerationConfig::with_sectors(30);
        let mut rng = RandomStream::from_seed(99);
        rng.next_u64();
        let err = generate_universe_with(&config, &mut rng).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"random stream for seed 99 was already drawn from and cannot be replayed"
        );
    }

    #[test]
    fn config_errors_surface_before_work() {
        let config = GenerationConfig {
            sector_count: 10,
            stardock_count: 15,
            ..GenerationConfig::default()
        };
        let err = generate_universe(&config).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Configuration(ConfigError::FeatureCountExceedsSectors { .. })
        ));
    }

    #[test]
    fn failed_generation_stores_nothing() {
        let mut store = MemoryStore::new();
        let config = GenerationConfig {
            sector_count: 3,
            ..GenerationConfig::default()
        };
        assert!(generate_and_persist(&config, &mut store).is_err());
        assert!(store.is_empty());

        let config = GenerationConfig::with_sectors(25).with_seed(4);
        let universe = generate_and_persist(&config, &mut store).unwrap();
        assert_eq!(store.universes(), std::slice::from_ref(&universe));
    }

    #[test]
    fn batch_keeps_input_order() {
        let configs: Vec<GenerationConfig> = (0..4)
            .map(|seed| GenerationConfig::with_sectors(20 + seed as u32 * 10).with_seed(seed))
            .collect();
        let results = generate_batch(&configs);
        for (config, result) in configs.iter().zip(results) {
            assert_eq!(result.unwrap().sector_count(), config.sector_count);
        }
    }
}
