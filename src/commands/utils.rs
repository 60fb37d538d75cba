use crate::frame::{resolve_frame_key, FrameKind, Response};
use crate::output::read_response;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Outcome of checking one frame of a response file
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub index: usize,
    pub key: Option<String>,
    pub kind: Result<FrameKind, String>,
    pub rectangular: bool,
    pub has_time: bool,
}

impl FrameReport {
    /// True if the frame can take part in a merge
    pub fn is_mergeable(&self) -> bool {
        self.key.is_some() && self.kind.is_ok() && self.has_time
    }
}

/// Check every frame of a response
pub fn check_response(response: &Response) -> Vec<FrameReport> {
    response
        .data
        .iter()
        .enumerate()
        .map(|(index, frame)| FrameReport {
            index,
            key: resolve_frame_key(frame).map(|k| k.to_string()),
            kind: FrameKind::of(frame).map_err(|e| e.to_string()),
            rectangular: frame.is_rectangular(),
            has_time: frame.time_field().is_some(),
        })
        .collect()
}

/// Validate a response JSON file
///
/// Fails if any frame could not be merged.
pub fn validate_response_file(file_path: PathBuf) -> Result<()> {
    println!("Validating response: {}", file_path.display());

    let response = read_response(&file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;

    println!("✓ Valid response JSON");
    println!("  Frames: {}", response.data.len());
    println!("  Errors: {}", response.errors.len());
    println!("  Trace IDs: {}", response.trace_ids.len());

    let reports = check_response(&response);
    for report in &reports {
        let kind = match &report.kind {
            Ok(kind) => kind.to_string(),
            Err(e) => e.clone(),
        };
        println!(
            "  {} frame {}: key {}, {}{}{}",
            if report.is_mergeable() { "✓" } else { "✗" },
            report.index,
            report.key.as_deref().unwrap_or("<none>"),
            kind,
            if report.rectangular { "" } else { ", ragged columns" },
            if report.has_time { "" } else { ", no time column" },
        );
    }

    let broken = reports.iter().filter(|r| !r.is_mergeable()).count();
    if broken > 0 {
        anyhow::bail!("{} of {} frames cannot be merged", broken, reports.len());
    }

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("wavefold v{}", env!("CARGO_PKG_VERSION"));
    println!("Response Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Incremental merger for streamed query responses.");
}
