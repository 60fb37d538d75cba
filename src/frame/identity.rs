//! Frame identity and kind resolution.
//!
//! A frame's key decides which accumulated frame an incoming frame merges
//! into. It is derived from the request id plus either the frame name or the
//! label set of its numeric column.

use log::debug;
use std::collections::BTreeMap;
use std::fmt;

use super::schema::Frame;
use crate::utils::config::SERIES_FRAME_TYPE;
use crate::utils::error::MergeError;

/// How a frame's rows combine with a matching accumulated frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Identity-bearing event rows (no declared `meta.type`)
    Rows,
    /// Additive numeric series (`meta.type == "timeseries-multi"`)
    Series,
}

impl FrameKind {
    /// Classify a frame by its declared `meta.type`
    ///
    /// # Errors
    /// * `MergeError::UnknownFrameType` - for any tag other than the series tag
    pub fn of(frame: &Frame) -> Result<Self, MergeError> {
        match frame.frame_type() {
            None => Ok(FrameKind::Rows),
            Some(SERIES_FRAME_TYPE) => Ok(FrameKind::Series),
            Some(other) => Err(MergeError::UnknownFrameType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Rows => "rows",
            FrameKind::Series => "series",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity key of a frame within one query execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    /// Request id, empty when the frame has none
    pub request_id: String,

    /// Frame name or serialized label set
    pub selector: Option<String>,
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.request_id,
            self.selector.as_deref().unwrap_or_default()
        )
    }
}

/// Resolve the identity key of a frame
///
/// Returns `None` when the frame has no name, no labeled numeric column
/// and no request id.
pub fn resolve_frame_key(frame: &Frame) -> Option<FrameKey> {
    let selector = match &frame.name {
        Some(name) => Some(name.clone()),
        None => label_selector(frame),
    };

    if selector.is_none() && frame.ref_id.is_none() {
        return None;
    }

    Some(FrameKey {
        request_id: frame.ref_id.clone().unwrap_or_default(),
        selector,
    })
}

/// Resolve the key and store a label-derived selector as the frame name
///
/// Later lookups on the same frame then go through the name directly.
pub fn resolve_and_memoize(frame: &mut Frame) -> Option<FrameKey> {
    if frame.name.is_none() {
        if let Some(selector) = label_selector(frame) {
            debug!("Memoizing frame name {}", selector);
            frame.name = Some(selector);
        }
    }
    resolve_frame_key(frame)
}

/// Serialized labels of the frame's numeric column, if it has any
fn label_selector(frame: &Frame) -> Option<String> {
    frame
        .value_field()
        .and_then(|field| field.labels.as_ref())
        .and_then(serialize_labels)
}

/// Serialize a label set as a JSON object with sorted keys
pub fn serialize_labels(labels: &BTreeMap<String, String>) -> Option<String> {
    serde_json::to_string(labels).ok()
}
