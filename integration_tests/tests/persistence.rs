mod common;

use std::fs;

use universe_gen::persistence::read_universe;
use universe_gen::{
    generate_and_persist, verify_universe, FileStore, GenerationConfig, GenerationError,
    InvariantViolation, MemoryStore, PersistenceError, StoreFormat, Universe, UniverseStore,
};

use common::{scratch_dir, seeded};

struct FailingStore {
    attempts: usize,
}

impl UniverseStore for FailingStore {
    fn persist(&mut self, _universe: &Universe) -> Result<(), PersistenceError> {
        self.attempts += 1;
        Err(PersistenceError::Rejected("disk full".into()))
    }
}

#[test]
fn stored_universes_round_trip_and_reverify() -> anyhow::Result<()> {
    for format in [StoreFormat::Json, StoreFormat::Bincode] {
        let dir = scratch_dir(&format!("roundtrip-{}", format.extension()));
        let mut store = FileStore::new(&dir, format);
        let universe = generate_and_persist(&seeded(750, 31), &mut store)?;

        let path = store.path_for(universe.fingerprint());
        let loaded = read_universe(&path, format)?;
        verify_universe(&loaded)?;
        assert_eq!(loaded, universe);
        assert_eq!(loaded.tables(), universe.tables());

        let entries: Vec<_> = fs::read_dir(&dir)?.collect::<Result<_, _>>()?;
        assert_eq!(entries.len(), 1, "staging file left behind in {}", dir.display());
        fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

#[test]
fn failed_persist_surfaces_and_keeps_nothing() {
    let mut store = FailingStore { attempts: 0 };
    let err = generate_and_persist(&seeded(40, 2), &mut store).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Persistence(PersistenceError::Rejected(_))
    ));
    assert_eq!(store.attempts, 1);
}

#[test]
fn invalid_config_never_reaches_store() {
    let mut store = FailingStore { attempts: 0 };
    let config = GenerationConfig {
        port_percentage: 140.0,
        ..seeded(40, 2)
    };
    assert!(matches!(
        generate_and_persist(&config, &mut store),
        Err(GenerationError::Configuration(_))
    ));
    assert_eq!(store.attempts, 0);
}

#[test]
fn duplicate_universe_is_rejected() {
    let mut store = MemoryStore::new();
    let config = seeded(64, 9);
    generate_and_persist(&config, &mut store).unwrap();
    let err = generate_and_persist(&config, &mut store).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Persistence(PersistenceError::AlreadyPersisted { .. })
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn tampered_file_fails_verification() -> anyhow::Result<()> {
    let dir = scratch_dir("tampered");
    let mut store = FileStore::new(&dir, StoreFormat::Json);
    let universe = generate_and_persist(&seeded(50, 4), &mut store)?;
    let path = store.path_for(universe.fingerprint());

    let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
    value["fingerprint"] = serde_json::json!(universe.fingerprint().wrapping_add(1));
    fs::write(&path, serde_json::to_vec(&value)?)?;

    let err = read_universe(&path, StoreFormat::Json).unwrap_err();
    assert!(matches!(err, PersistenceError::Corrupt(_)), "{err}");
    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn emptied_file_is_corrupt_not_a_panic() -> anyhow::Result<()> {
    let dir = scratch_dir("emptied");
    let mut store = FileStore::new(&dir, StoreFormat::Json);
    let universe = generate_and_persist(&seeded(40, 6), &mut store)?;
    let path = store.path_for(universe.fingerprint());

    let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
    value["params"]["config"]["sector_count"] = serde_json::json!(0);
    value["sectors"] = serde_json::json!([]);
    value["links"] = serde_json::json!([]);
    fs::write(&path, serde_json::to_vec(&value)?)?;

    let err = read_universe(&path, StoreFormat::Json).unwrap_err();
    assert!(
        matches!(err, PersistenceError::Corrupt(InvariantViolation::TooFewSectors { .. })),
        "{err}"
    );
    fs::remove_dir_all(&dir)?;
    Ok(())
}
