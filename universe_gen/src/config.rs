use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureKind;

pub const MIN_SECTOR_COUNT: u32 = 10;
pub const MAX_SECTOR_COUNT: u32 = 100_000;
pub const MIN_WARP_CAP: u32 = 3;

/// How a feature category picks among the remaining candidate sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    #[default]
    Uniform,
    /// Weight each candidate by its warp count.
    Connectivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureWeighting {
    pub hub_stations: Weighting,
    pub spawn_sites: Weighting,
    pub ports: Weighting,
    pub planets: Weighting,
}

impl Default for FeatureWeighting {
    fn default() -> Self {
        Self {
            hub_stations: Weighting::Connectivity,
            spawn_sites: Weighting::Uniform,
            ports: Weighting::Uniform,
            planets: Weighting::Uniform,
        }
    }
}

impl FeatureWeighting {
    pub fn for_kind(&self, kind: FeatureKind) -> Weighting {
        match kind {
            FeatureKind::HubStation => self.hub_stations,
            FeatureKind::SpawnSite => self.spawn_sites,
            FeatureKind::Port => self.ports,
            FeatureKind::Planet => self.planets,
        }
    }
}

/// Parameters for a single universe generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    pub sector_count: u32,
    /// Percentage (0..=100) of sectors that receive a trading port.
    pub port_percentage: f32,
    /// Exact number of hub stations.
    pub stardock_count: u32,
    /// Exact number of hostile spawn sites.
    pub alien_planet_count: u32,
    pub allow_dead_ends: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_planet_percentage")]
    pub planet_percentage: f32,
    #[serde(default = "default_target_average_degree")]
    pub target_average_degree: f32,
    #[serde(default = "default_max_warps_per_sector")]
    pub max_warps_per_sector: u32,
    /// Spawn sites prefer candidates more than this many warps from any
    /// other spawn site.
    #[serde(default = "default_spawn_separation")]
    pub spawn_separation: u32,
    #[serde(default = "default_max_repair_rounds")]
    pub max_repair_rounds: u32,
    #[serde(default)]
    pub weighting: FeatureWeighting,
}

const fn default_planet_percentage() -> f32 {
    5.0
}

const fn default_target_average_degree() -> f32 {
    3.0
}

const fn default_max_warps_per_sector() -> u32 {
    6
}

const fn default_spawn_separation() -> u32 {
    2
}

const fn default_max_repair_rounds() -> u32 {
    8
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            sector_count: 1000,
            port_percentage: 40.0,
            stardock_count: 1,
            alien_planet_count: 10,
            allow_dead_ends: false,
            seed: None,
            planet_percentage: default_planet_percentage(),
            target_average_degree: default_target_average_degree(),
            max_warps_per_sector: default_max_warps_per_sector(),
            spawn_separation: default_spawn_separation(),
            max_repair_rounds: default_max_repair_rounds(),
            weighting: FeatureWeighting::default(),
        }
    }
}

impl GenerationConfig {
    /// Config for `sector_count` sectors with the remaining fields at their
    /// defaults.
    pub fn with_sectors(sector_count: u32) -> Self {
        Self {
            sector_count,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sector_count < MIN_SECTOR_COUNT {
            return Err(ConfigError::SectorCountTooLow {
                requested: self.sector_count,
                minimum: MIN_SECTOR_COUNT,
            });
        }
        if self.sector_count > MAX_SECTOR_COUNT {
            return Err(ConfigError::SectorCountTooHigh {
                requested: self.sector_count,
                maximum: MAX_SECTOR_COUNT,
            });
        }
        check_percentage("port_percentage", self.port_percentage)?;
        check_percentage("planet_percentage", self.planet_percentage)?;
        for (feature, requested) in [
            (FeatureKind::HubStation, self.stardock_count),
            (FeatureKind::SpawnSite, self.alien_planet_count),
        ] {
            if requested > self.sector_count {
                return Err(ConfigError::FeatureCountExceedsSectors {
                    feature,
                    requested,
                    sectors: self.sector_count,
                });
            }
        }
        if self.max_warps_per_sector < MIN_WARP_CAP {
            return Err(ConfigError::WarpCapTooLow {
                requested: self.max_warps_per_sector,
                minimum: MIN_WARP_CAP,
            });
        }
        let degree = self.target_average_degree;
        if !degree.is_finite() || degree <= 0.0 || degree > self.max_warps_per_sector as f32 {
            return Err(ConfigError::DegreeTargetOutOfRange {
                requested: degree,
                cap: self.max_warps_per_sector,
            });
        }
        if self.max_repair_rounds == 0 {
            return Err(ConfigError::NoRepairRounds);
        }
        Ok(())
    }

    pub fn port_target(&self) -> u32 {
        density_target(self.port_percentage, self.sector_count)
    }

    pub fn planet_target(&self) -> u32 {
        density_target(self.planet_percentage, self.sector_count)
    }
}

fn density_target(percentage: f32, sector_count: u32) -> u32 {
    (percentage as f64 / 100.0 * sector_count as f64).round() as u32
}

fn check_percentage(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::PercentageOutOfRange { field, value })
    }
}

// Floats hash by bit pattern so identical configs fingerprint identically.
impl Hash for GenerationConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sector_count.hash(state);
        self.port_percentage.to_bits().hash(state);
        self.stardock_count.hash(state);
        self.alien_planet_count.hash(state);
        self.allow_dead_ends.hash(state);
        self.seed.hash(state);
        self.planet_percentage.to_bits().hash(state);
        self.target_average_degree.to_bits().hash(state);
        self.max_warps_per_sector.hash(state);
        self.spawn_separation.hash(state);
        self.max_repair_rounds.hash(state);
        self.weighting.hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sector count {requested} is below the minimum of {minimum}")]
    SectorCountTooLow { requested: u32, minimum: u32 },
    #[error("sector count {requested} exceeds the maximum of {maximum}")]
    SectorCountTooHigh { requested: u32, maximum: u32 },
    #[error("{field} must be within 0..=100, got {value}")]
    PercentageOutOfRange { field: &'static str, value: f32 },
    #[error("{feature} count {requested} exceeds sector count {sectors}")]
    FeatureCountExceedsSectors {
        feature: FeatureKind,
        requested: u32,
        sectors: u32,
    },
    #[error("max_warps_per_sector must be at least {minimum}, got {requested}")]
    WarpCapTooLow { requested: u32, minimum: u32 },
    #[error("target_average_degree must be within (0, {cap}], got {requested}")]
    DegreeTargetOutOfRange { requested: f32, cap: u32 },
    #[error("max_repair_rounds must be at least 1")]
    NoRepairRounds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(GenerationConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_small_universe() {
        let err = GenerationConfig::with_sectors(5).validate().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"sector count 5 is below the minimum of 10");
    }

    #[test]
    fn rejects_stardocks_beyond_sector_count() {
        let config = GenerationConfig {
            stardock_count: 15,
            ..GenerationConfig::with_sectors(10)
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FeatureCountExceedsSectors {
                feature: FeatureKind::HubStation,
                requested: 15,
                sectors: 10,
            }
        ));
        insta::assert_snapshot!(err.to_string(), @"hub station count 15 exceeds sector count 10");
    }

    #[test]
    fn rejects_bad_percentages() {
        let config = GenerationConfig {
            port_percentage: 120.0,
            ..GenerationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PercentageOutOfRange {
                field: "port_percentage",
                ..
            })
        ));

        let config = GenerationConfig {
            planet_percentage: f32::NAN,
            ..GenerationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PercentageOutOfRange {
                field: "planet_percentage",
                ..
            })
        ));
    }

    #[test]
    fn rejects_degree_target_above_cap() {
        let config = GenerationConfig {
            target_average_degree: 7.5,
            max_warps_per_sector: 6,
            ..GenerationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DegreeTargetOutOfRange { cap: 6, .. })
        ));
    }

    #[test]
    fn density_targets_round_to_nearest() {
        let config = GenerationConfig {
            port_percentage: 20.0,
            planet_percentage: 12.5,
            ..GenerationConfig::with_sectors(20)
        };
        assert_eq!(config.port_target(), 4);
        // 2.5 rounds away from zero.
        assert_eq!(config.planet_target(), 3);
    }

    #[test]
    fn parses_minimal_json_with_defaults() {
        let json = r#"{
            "sector_count": 20,
            "port_percentage": 20,
            "stardock_count": 1,
            "alien_planet_count": 1,
            "allow_dead_ends": false
        }"#;
        let config: GenerationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.seed, None);
        assert_eq!(config.max_warps_per_sector, 6);
        assert_eq!(config.weighting, FeatureWeighting::default());
        assert_eq!(config.port_target(), 4);
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"{
            "sector_count": 20,
            "port_percentage": 20,
            "stardock_count": 1,
            "alien_planet_count": 1,
            "allow_dead_ends": false,
            "wormholes": true
        }"#;
        assert!(serde_json::from_str::<GenerationConfig>(json).is_err());
    }
}
