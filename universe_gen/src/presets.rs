use std::{
    collections::BTreeMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::config::{ConfigError, GenerationConfig};

pub const BUILTIN_UNIVERSE_PRESETS: &str = include_str!("data/universe_presets.json");

/// Names an override file for [`load_presets_from_env`].
pub const PRESETS_PATH_ENV: &str = "UNIVERSE_PRESETS_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniversePreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct UniversePresetsFile {
    presets: Vec<UniversePreset>,
}

#[derive(Debug, Clone)]
pub struct UniversePresets {
    by_id: BTreeMap<String, UniversePreset>,
}

impl UniversePresets {
    pub fn builtin() -> Arc<Self> {
        let presets = Self::from_json_str(BUILTIN_UNIVERSE_PRESETS)
            .expect("builtin universe presets should parse");
        Arc::new(presets)
    }

    /// Parse a catalogue. Ids must be unique and every config must validate.
    pub fn from_json_str(json: &str) -> Result<Self, PresetsError> {
        let parsed: UniversePresetsFile = serde_json::from_str(json)?;
        let mut by_id = BTreeMap::new();
        for preset in parsed.presets {
            preset
                .config
                .validate()
                .map_err(|source| PresetsError::Invalid {
                    id: preset.id.clone(),
                    source,
                })?;
            if by_id.contains_key(&preset.id) {
                return Err(PresetsError::DuplicateId(preset.id));
            }
            by_id.insert(preset.id.clone(), preset);
        }
        Ok(Self { by_id })
    }

    pub fn from_file(path: &Path) -> Result<Self, PresetsError> {
        let contents = fs::read_to_string(path).map_err(|source| PresetsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        UniversePresets::from_json_str(&contents)
    }

    pub fn get(&self, id: &str) -> Option<&UniversePreset> {
        self.by_id.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&UniversePreset, PresetsError> {
        self.get(id)
            .ok_or_else(|| PresetsError::UnknownPreset(id.to_string()))
    }

    /// Preset ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UniversePreset> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum PresetsError {
    #[error("failed to parse universe presets: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read universe presets from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("duplicate universe preset id `{0}`")]
    DuplicateId(String),
    #[error("unknown universe preset `{0}`")]
    UnknownPreset(String),
    #[error("universe preset `{id}` is invalid: {source}")]
    Invalid {
        id: String,
        #[source]
        source: ConfigError,
    },
}

/// Load presets from `UNIVERSE_PRESETS_PATH` when set, falling back to the
/// built-in catalogue. Returns the file that was used, if any.
pub fn load_presets_from_env() -> (Arc<UniversePresets>, Option<PathBuf>) {
    if let Some(path) = env::var_os(PRESETS_PATH_ENV).map(PathBuf::from) {
        match UniversePresets::from_file(&path) {
            Ok(presets) => {
                tracing::info!(
                    target: "universe_gen::presets",
                    path = %path.display(),
                    count = presets.len(),
                    "universe_presets.loaded=file"
                );
                return (Arc::new(presets), Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "universe_gen::presets",
                    path = %path.display(),
                    error = %err,
                    "universe_presets.load_failed"
                );
            }
        }
    }

    let presets = UniversePresets::builtin();
    tracing::info!(
        target: "universe_gen::presets",
        count = presets.len(),
        "universe_presets.loaded=builtin"
    );
    (presets, None)
}

/// Read a single [`GenerationConfig`] from a JSON file.
pub fn load_config_file(path: &Path) -> Result<GenerationConfig, PresetsError> {
    let contents = fs::read_to_string(path).map_err(|source| PresetsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: GenerationConfig = serde_json::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogue_parses() {
        let presets = UniversePresets::builtin();
        assert!(!presets.is_empty());
        let ids: Vec<&str> = presets.ids().collect();
        assert!(ids.contains(&"classic"), "{ids:?}");
        for preset in presets.iter() {
            assert!(!preset.name.is_empty(), "{}", preset.id);
        }
    }

    #[test]
    fn optional_fields_take_defaults() {
        let json = r#"{
            "presets": [{
                "id": "tiny",
                "name": "Tiny",
                "config": {
                    "sector_count": 12,
                    "port_percentage": 25,
                    "stardock_count": 1,
                    "alien_planet_count": 1,
                    "allow_dead_ends": true
                }
            }]
        }"#;
        let presets = UniversePresets::from_json_str(json).unwrap();
        let config = &presets.require("tiny").unwrap().config;
        assert_eq!(config.seed, None);
        assert_eq!(config.max_warps_per_sector, 6);
        assert_eq!(config.max_repair_rounds, 8);
        assert_eq!(config.planet_percentage, 5.0);
    }

    #[test]
    fn rejects_unknown_config_fields() {
        let json = r#"{"presets": [{"id": "x", "name": "X", "config": {
            "sector_count": 12, "port_percentage": 25, "stardock_count": 1,
            "alien_planet_count": 1, "allow_dead_ends": true, "wormholes": 3
        }}]}"#;
        assert!(matches!(
            UniversePresets::from_json_str(json),
            Err(PresetsError::Parse(_))
        ));
    }

    #[test]
    fn rejects_invalid_and_duplicate_presets() {
        let preset = |id: &str, sectors: u32| {
            format!(
                r#"{{"id": "{id}", "name": "{id}", "config": {{
                    "sector_count": {sectors}, "port_percentage": 10, "stardock_count": 1,
                    "alien_planet_count": 1, "allow_dead_ends": false
                }}}}"#
            )
        };
        let invalid = format!(r#"{{"presets": [{}]}}"#, preset("small", 4));
        let err = UniversePresets::from_json_str(&invalid).unwrap_err();
        insta::assert_snapshot!(
            err.to_string(),
            @"universe preset `small` is invalid: sector count 4 is below the minimum of 10"
        );

        let duplicate = format!(
            r#"{{"presets": [{}, {}]}}"#,
            preset("twin", 20),
            preset("twin", 30)
        );
        assert!(matches!(
            UniversePresets::from_json_str(&duplicate),
            Err(PresetsError::DuplicateId(id)) if id == "twin"
        ));
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let presets = UniversePresets::builtin();
        let err = presets.require("nowhere").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"unknown universe preset `nowhere`");
    }
}
