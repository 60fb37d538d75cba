//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while folding a wave into an accumulated response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    /// The frame declares a `meta.type` the merger does not understand.
    /// Fails the whole wave.
    #[error("Unknown frame type: {0}")]
    UnknownFrameType(String),

    /// The frame has no name, no labeled numeric column and no request id,
    /// so it cannot be matched against accumulated frames.
    #[error("Frame at index {index} has no name, labels or request id")]
    MissingIdentity { index: usize },

    /// One side of a frame pair has no time column. Recovered locally:
    /// the merge of that pair is skipped.
    #[error("Time fields not found in the data frames")]
    MissingTimeField,
}

/// Errors that can occur while reading or writing response files
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("Failed to read file: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config TOML parse error: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
