use crate::utils::config::MAX_SHARDS;
use std::path::PathBuf;

/// Arguments for the merge command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct MergeArgs {
    /// Wave files, folded in order
    pub waves: Vec<PathBuf>,

    /// Output path for the merged response (stdout when absent)
    pub output: Option<PathBuf>,

    /// Optional TOML configuration file
    pub config: Option<PathBuf>,

    /// Drop waves that fail ingestion instead of aborting
    pub skip_invalid: bool,

    /// Print a text summary to stdout
    pub print_summary: bool,
}

impl Default for MergeArgs {
    fn default() -> Self {
        Self {
            waves: Vec::new(),
            output: Some(PathBuf::from("merged.json")),
            config: None,
            skip_invalid: false,
            print_summary: false,
        }
    }
}

/// Arguments for the plan command
#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
    /// Shard values to plan over
    pub shards: Vec<u32>,

    /// Parent request id used to derive sub-request ids
    pub request_id: Option<String>,

    /// Backend execution time reported by every simulated wave, in seconds
    pub exec_time: Option<f64>,

    /// Optional TOML configuration file
    pub config: Option<PathBuf>,
}

/// Parse a `--shards` argument
///
/// A single number `n` means shards `0..n`; a comma-separated list names
/// the shard values directly. Either form is limited to `MAX_SHARDS` shards.
pub fn parse_shards(raw: &str) -> Result<Vec<u32>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("shard list cannot be empty".to_string());
    }

    if !raw.contains(',') {
        let count: u32 = raw
            .parse()
            .map_err(|_| format!("invalid shard count: {}", raw))?;
        if count as usize > MAX_SHARDS {
            return Err(format!(
                "shard count {} exceeds the maximum of {}",
                count, MAX_SHARDS
            ));
        }
        return Ok((0..count).collect());
    }

    let shards = raw
        .split(',')
        .map(|value| {
            let value = value.trim();
            value
                .parse()
                .map_err(|_| format!("invalid shard value: {}", value))
        })
        .collect::<Result<Vec<u32>, String>>()?;

    if shards.len() > MAX_SHARDS {
        return Err(format!(
            "{} shards exceed the maximum of {}",
            shards.len(),
            MAX_SHARDS
        ));
    }
    Ok(shards)
}
