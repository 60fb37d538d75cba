//! Merge command implementation.
//!
//! The merge command:
//! 1. Loads configuration
//! 2. Reads every wave file
//! 3. Folds the waves in order
//! 4. Writes the merged response

use super::models::MergeArgs;
use crate::frame::Response;
use crate::merge::ResponseAccumulator;
use crate::output::{read_waves, render_merge_summary, response_to_string, write_response};
use crate::utils::config::{load_config, WavefoldConfig};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::time::Instant;

/// Execute the merge command
///
/// **Public** - main entry point called from main.rs
///
/// # Returns
/// The merged response, also written to `args.output` (or stdout)
///
/// # Errors
/// * Configuration load failures
/// * Wave file read or parse errors
/// * A wave failing ingestion, unless `skip_invalid` is set
/// * Output write errors
pub fn execute_merge(args: MergeArgs) -> Result<Response> {
    let start_time = Instant::now();

    validate_args(&args)?;

    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WavefoldConfig::default(),
    };
    debug!("Merge settings: {:?}", config.merge);

    let mut accumulator = ResponseAccumulator::with_settings(config.merge);
    let mut skipped = 0usize;

    for path in &args.waves {
        let waves = read_waves(path)
            .with_context(|| format!("Failed to read waves from {}", path.display()))?;
        info!("Folding {} waves from {}", waves.len(), path.display());

        for (position, wave) in waves.iter().enumerate() {
            match accumulator.accumulate(wave) {
                Ok(()) => {}
                Err(e) if args.skip_invalid => {
                    warn!("Skipping wave {} of {}: {}", position, path.display(), e);
                    skipped += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to merge wave {} of {}", position, path.display())
                    });
                }
            }
        }
    }

    let merged = accumulator.snapshot();

    match &args.output {
        Some(path) => write_response(&merged, path).context("Failed to write merged response")?,
        None => println!(
            "{}",
            response_to_string(&merged).context("Failed to serialize merged response")?
        ),
    }

    if args.print_summary {
        println!("{}", render_merge_summary(&merged, accumulator.wave_count()));
    }

    info!(
        "Merged {} waves ({} skipped) in {:.2}s",
        accumulator.wave_count(),
        skipped,
        start_time.elapsed().as_secs_f64()
    );

    Ok(merged)
}

/// Validate merge arguments
pub fn validate_args(args: &MergeArgs) -> Result<()> {
    if args.waves.is_empty() {
        anyhow::bail!("At least one wave file is required");
    }

    if let Some(missing) = args.waves.iter().find(|p| !p.exists()) {
        anyhow::bail!("Wave file not found: {}", missing.display());
    }

    Ok(())
}
