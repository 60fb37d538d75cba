//! Readers and writers for response files, and terminal summaries.
//!
//! This module handles moving data between disk and the merger:
//! - JSON wave files (one response or an array of them)
//! - JSON merged responses (pretty printed)
//! - Colored text summaries

pub mod json;
pub mod summary;

use crate::utils::error::OutputError;
use log::debug;
use std::path::Path;

// Re-export main functions
pub use json::{read_response, read_waves, response_to_string, write_response};
pub use summary::{format_millis, render_merge_summary, time_span, total_rows};

/// Validate that an output path is writable
pub(crate) fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            debug!("Parent directory will be created: {}", parent.display());
        }
    }

    Ok(())
}
