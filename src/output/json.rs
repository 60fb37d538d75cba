//! JSON response reader and writer.
//!
//! Wave files hold either a single response object or an array of
//! responses, in arrival order.

use crate::frame::Response;
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::validate_output_path;

/// One response or a sequence of them
#[derive(Deserialize)]
#[serde(untagged)]
enum WaveFile {
    Many(Vec<Response>),
    One(Box<Response>),
}

/// Write a response to a JSON file
///
/// # Arguments
/// * `response` - Response to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
///
/// # Example
/// ```ignore
/// let merged = accumulator.snapshot();
/// write_response(&merged, "merged.json")?;
/// ```
pub fn write_response(response: &Response, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing response to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, response)?;

    info!(
        "Response written ({} frames, {} bytes)",
        response.data.len(),
        file_size(output_path)
    );

    Ok(())
}

/// Serialize a response to a pretty JSON string
pub fn response_to_string(response: &Response) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(response)?)
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a single response from a JSON file
///
/// # Errors
/// * `OutputError::ReadFailed` - File cannot be opened
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_response(input_path: impl AsRef<Path>) -> Result<Response, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading response from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::ReadFailed)?;
    let response: Response = serde_json::from_reader(BufReader::new(file))?;

    debug!("Response loaded: {} frames", response.data.len());

    Ok(response)
}

/// Read the waves held by a JSON file
///
/// Accepts a single response object or an array of responses.
pub fn read_waves(input_path: impl AsRef<Path>) -> Result<Vec<Response>, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading waves from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::ReadFailed)?;
    let waves = match serde_json::from_reader(BufReader::new(file))? {
        WaveFile::Many(waves) => waves,
        WaveFile::One(wave) => vec![*wave],
    };

    debug!("Loaded {} waves from {}", waves.len(), input_path.display());

    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Field, Frame};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_response() -> Response {
        Response::with_frames(vec![Frame::new(vec![
            Field::time("Time", vec![1, 2]),
            Field::string("Line", vec!["a", "b"]),
        ])
        .with_ref_id("A")])
    }

    #[test]
    fn test_write_and_read_response() {
        let response = create_test_response();
        let temp_file = NamedTempFile::new().unwrap();

        write_response(&response, temp_file.path()).unwrap();
        let loaded = read_response(temp_file.path()).unwrap();

        assert_eq!(loaded, response);
    }

    #[test]
    fn test_read_waves_single_object() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", response_to_string(&create_test_response()).unwrap()).unwrap();

        let waves = read_waves(file.path()).unwrap();
        assert_eq!(waves, vec![create_test_response()]);
    }

    #[test]
    fn test_read_waves_array() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"data": []}}, {{"data": [], "traceIds": ["t"]}}]"#).unwrap();

        let waves = read_waves(file.path()).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[1].trace_ids, vec!["t".to_string()]);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_response("/nonexistent/wave.json");
        assert!(matches!(result, Err(OutputError::ReadFailed(_))));
    }

    #[test]
    fn test_read_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = read_waves(file.path());
        assert!(matches!(result, Err(OutputError::SerializationFailed(_))));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/merged.json");

        write_response(&create_test_response(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }
}
