//! Configuration and constants for the merger and the CLI.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::ConfigError;

/// Current schema version reported by the CLI
pub const SCHEMA_VERSION: &str = "1.0.0";

/// `meta.type` tag carried by additive numeric series frames
pub const SERIES_FRAME_TYPE: &str = "timeseries-multi";

/// The only statistic that survives a merge (summed across waves)
pub const TOTAL_BYTES_STAT: &str = "Summary: total bytes processed";

/// Statistic used by the shard planner to size the next request group
pub const EXEC_TIME_STAT: &str = "Summary: exec time";

/// Name of the string column holding explicit row identities
pub const DEFAULT_ID_FIELD: &str = "id";

// Shard planner defaults
pub const DEFAULT_MAX_RETRIES: u32 = 4;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1500;
pub const DEFAULT_MAX_GROUP_FACTOR: f64 = 0.7;

/// Upper bound on the number of shards a plan may cover
pub const MAX_SHARDS: usize = 100_000;

/// Complete configuration file (`wavefold.toml`)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WavefoldConfig {
    /// Merge behavior
    #[serde(default)]
    pub merge: MergeSettings,

    /// Shard planner behavior
    #[serde(default)]
    pub sharding: ShardingSettings,
}

/// Settings for the frame merger
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MergeSettings {
    /// Name of the string column used as explicit row identity
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
        }
    }
}

/// Settings for the shard planner
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShardingSettings {
    /// Attempts per cycle once the group size is down to 1
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Maximum share of the pending shards a single group may take
    #[serde(default = "default_max_group_factor")]
    pub max_group_factor: f64,
}

impl Default for ShardingSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            max_group_factor: default_max_group_factor(),
        }
    }
}

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}

fn default_max_group_factor() -> f64 {
    DEFAULT_MAX_GROUP_FACTOR
}

/// Load configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the TOML configuration file
///
/// # Errors
/// * `ConfigError::IoError` - If file cannot be read
/// * `ConfigError::ParseFailed` - If TOML is invalid
/// * `ConfigError::Invalid` - If a value is out of range
///
/// # Example
/// ```ignore
/// let config = load_config("wavefold.toml")?;
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<WavefoldConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse configuration from TOML text
pub fn parse_config(contents: &str) -> Result<WavefoldConfig, ConfigError> {
    let config: WavefoldConfig = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &WavefoldConfig) -> Result<(), ConfigError> {
    if config.merge.id_field.trim().is_empty() {
        return Err(ConfigError::Invalid("merge.id_field cannot be empty".to_string()));
    }

    let factor = config.sharding.max_group_factor;
    if !(factor > 0.0 && factor <= 1.0) {
        return Err(ConfigError::Invalid(format!(
            "sharding.max_group_factor must be in (0, 1], got {}",
            factor
        )));
    }

    Ok(())
}
