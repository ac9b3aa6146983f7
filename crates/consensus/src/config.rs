//! Runtime configuration for the DAG core.

use crate::anticone::{anticone_bound, BLOCK_DELAY_SECS, SECURITY_LEVEL};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

const ENV_ANTICONE_SIZE: &str = "BLOCKDAG_ANTICONE_SIZE";
const ENV_TIPS_DISTANCE_LIMIT: &str = "BLOCKDAG_TIPS_DISTANCE_LIMIT";

/// Default layer gap tolerated between a tip and the highest tip.
pub const DEFAULT_TIPS_DISTANCE_LIMIT: u64 = 100;

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Timing parameters of the network the bound is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkTiming {
    /// Worst-case propagation delay, seconds.
    pub block_delay_secs: f64,
    /// Target interval between blocks, seconds.
    pub target_block_interval_secs: f64,
    pub security_level: f64,
}

impl Default for NetworkTiming {
    fn default() -> Self {
        Self {
            block_delay_secs: BLOCK_DELAY_SECS,
            target_block_interval_secs: 30.0,
            security_level: SECURITY_LEVEL,
        }
    }
}

impl NetworkTiming {
    pub fn block_rate(&self) -> f64 {
        if self.target_block_interval_secs <= 0.0 {
            return 0.0;
        }
        1.0 / self.target_block_interval_secs
    }

    pub fn anticone_size(&self) -> u32 {
        anticone_bound(self.block_delay_secs, self.block_rate(), self.security_level)
    }
}

/// DAG core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DagConfig {
    /// PHANTOM `k`: blue blocks tolerated in a blue block's anticone.
    pub anticone_size: u32,
    /// Tips whose layer is more than this below the highest tip are evicted.
    pub tips_distance_limit: u64,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            anticone_size: NetworkTiming::default().anticone_size(),
            tips_distance_limit: DEFAULT_TIPS_DISTANCE_LIMIT,
        }
    }
}

/// On-disk layout: `[dag]` plus an optional `[timing]` table. When
/// `[timing]` is present and `dag.anticone_size` is not, the bound is derived
/// from the timing parameters.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    dag: Option<PartialDagConfig>,
    #[serde(default)]
    timing: Option<NetworkTiming>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialDagConfig {
    anticone_size: Option<u32>,
    tips_distance_limit: Option<u64>,
}

impl DagConfig {
    pub fn new(anticone_size: u32, tips_distance_limit: u64) -> Self {
        Self {
            anticone_size,
            tips_distance_limit,
        }
    }

    pub fn from_timing(timing: &NetworkTiming) -> Self {
        Self {
            anticone_size: timing.anticone_size(),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = match &file.timing {
            Some(timing) => Self::from_timing(timing),
            None => Self::default(),
        };
        if let Some(dag) = file.dag {
            if let Some(k) = dag.anticone_size {
                config.anticone_size = k;
            }
            if let Some(limit) = dag.tips_distance_limit {
                config.tips_distance_limit = limit;
            }
        }
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override fields from `BLOCKDAG_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var(ENV_ANTICONE_SIZE) {
            self.anticone_size = value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_ANTICONE_SIZE,
                value,
            })?;
        }
        if let Ok(value) = env::var(ENV_TIPS_DISTANCE_LIMIT) {
            self.tips_distance_limit =
                value.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: ENV_TIPS_DISTANCE_LIMIT,
                    value,
                })?;
        }
        Ok(())
    }
}
