//! Response and frame schema definitions.
//!
//! This module defines the JSON shape exchanged with the query backend.
//! Field names follow the backend's camelCase wire format.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::utils::config::SERIES_FRAME_TYPE;

/// One wave (or the accumulated result) of a query execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Frames carried by this response
    #[serde(default)]
    pub data: Vec<Frame>,

    /// Single error, kept for consumers that only read one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<QueryError>,

    /// All errors reported so far
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<QueryError>,

    /// Backend trace identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace_ids: Vec<String>,

    /// Loading state reported by the orchestrating loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LoadingState>,
}

impl Response {
    /// Create a response holding the given frames
    pub fn with_frames(data: Vec<Frame>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    /// True if the response reports any error
    pub fn has_errors(&self) -> bool {
        self.error.is_some() || !self.errors.is_empty()
    }

    /// Message of the most relevant error (first of the list, else the single one)
    pub fn first_error_message(&self) -> Option<&str> {
        self.errors
            .first()
            .or(self.error.as_ref())
            .map(|e| e.message.as_str())
    }
}

/// Loading state of a streamed query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingState {
    Streaming,
    Done,
    Error,
}

/// An error reported by the query backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,

    /// Anything else the backend attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// A columnar container of log rows or a labeled numeric series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Request id of the query that produced this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,

    #[serde(default)]
    pub fields: Vec<Field>,

    /// Declared row count
    #[serde(default)]
    pub length: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,

    /// Frame keys the merger does not interpret, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Frame {
    /// Create a frame from columns; `length` is taken from the first column
    pub fn new(fields: Vec<Field>) -> Self {
        let length = fields.first().map_or(0, |f| f.values.len());
        Self {
            fields,
            length,
            ..Default::default()
        }
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, meta: FrameMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// First column of type `time`
    pub fn time_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_type == FieldType::Time)
    }

    /// First column of type `number`
    pub fn value_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.field_type == FieldType::Number)
    }

    /// Declared `meta.type` tag, if any
    pub fn frame_type(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.frame_type.as_deref())
    }

    /// Statistics attached to the frame (empty if none)
    pub fn stats(&self) -> &[Stat] {
        self.meta
            .as_ref()
            .and_then(|m| m.stats.as_deref())
            .unwrap_or(&[])
    }

    /// True if every column holds exactly `length` values
    pub fn is_rectangular(&self) -> bool {
        self.fields.iter().all(|f| f.values.len() == self.length)
    }
}

/// Frame metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    /// Declared frame kind (`timeseries-multi` for series, absent for rows)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub frame_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Vec<Stat>>,

    /// Metadata the merger does not interpret, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FrameMeta {
    /// Metadata for an additive series frame
    pub fn series() -> Self {
        Self {
            frame_type: Some(SERIES_FRAME_TYPE.to_string()),
            ..Default::default()
        }
    }

    pub fn with_stats(mut self, stats: Vec<Stat>) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// A named numeric statistic reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    pub value: f64,
}

impl Stat {
    pub fn new(display_name: impl Into<String>, value: f64) -> Self {
        Self {
            display_name: display_name.into(),
            unit: None,
            value,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Semantic type of a column
///
/// Tags the merger has no rule for are kept verbatim in `Unknown`, so they
/// are written back exactly as they were read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Time,
    Number,
    String,
    Boolean,
    /// Structured values (e.g. per-row label maps)
    Other,
    Unknown(String),
}

impl FieldType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "time" => FieldType::Time,
            "number" => FieldType::Number,
            "string" => FieldType::String,
            "boolean" => FieldType::Boolean,
            "other" => FieldType::Other,
            unknown => FieldType::Unknown(unknown.to_string()),
        }
    }

    /// Wire tag of the type
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Time => "time",
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Other => "other",
            FieldType::Unknown(tag) => tag,
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(FieldType::from_tag(&tag))
    }
}

/// A single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub config: Map<String, Value>,

    /// Cell values. A cell past the end of this list is undefined.
    #[serde(default)]
    pub values: Vec<Value>,

    /// Sub-millisecond offsets, time columns only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nanos: Option<Vec<u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Column keys the merger does not interpret (e.g. `typeInfo`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new<V: Into<Value>>(
        name: impl Into<String>,
        field_type: FieldType,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            config: Map::new(),
            values: values.into_iter().map(Into::into).collect(),
            nanos: None,
            labels: None,
            extra: Map::new(),
        }
    }

    /// Time column with epoch-millisecond values
    pub fn time(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::new(name, FieldType::Time, values)
    }

    pub fn number<V: Into<Value>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(name, FieldType::Number, values)
    }

    pub fn string<V: Into<Value>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(name, FieldType::String, values)
    }

    /// Structured column (e.g. per-row label maps)
    pub fn other(name: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(name, FieldType::Other, values)
    }

    pub fn with_nanos(mut self, nanos: Vec<u32>) -> Self {
        self.nanos = Some(nanos);
        self
    }

    pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels = Some(
            labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_shape() {
        let raw = json!({
            "data": [{
                "refId": "A",
                "fields": [
                    {"name": "Time", "type": "time", "config": {}, "values": [1, 2], "nanos": [10, 20]},
                    {"name": "Value", "type": "number", "config": {}, "values": [5, 6], "labels": {"level": "debug"}}
                ],
                "length": 2,
                "meta": {
                    "type": "timeseries-multi",
                    "stats": [{"displayName": "Summary: total bytes processed", "unit": "decbytes", "value": 11}],
                    "executedQueryString": "sum(rate({app=\"x\"}[1m]))"
                }
            }],
            "errors": [{"message": "timeout", "refId": "A"}],
            "traceIds": ["abc"]
        });

        let response: Response = serde_json::from_value(raw.clone()).unwrap();
        let frame = &response.data[0];
        assert_eq!(frame.ref_id.as_deref(), Some("A"));
        assert_eq!(frame.frame_type(), Some(SERIES_FRAME_TYPE));
        assert_eq!(frame.time_field().unwrap().nanos, Some(vec![10, 20]));
        assert_eq!(frame.stats()[0].value, 11.0);
        assert_eq!(response.errors[0].ref_id.as_deref(), Some("A"));
        assert_eq!(response.trace_ids, vec!["abc".to_string()]);

        // Unknown metadata survives a round trip
        let back = serde_json::to_value(&response).unwrap();
        assert_eq!(
            back["data"][0]["meta"]["executedQueryString"],
            raw["data"][0]["meta"]["executedQueryString"]
        );
    }

    #[test]
    fn test_unknown_field_type_is_kept() {
        let field: Field =
            serde_json::from_value(json!({"name": "x", "type": "enum", "values": []})).unwrap();
        assert_eq!(field.field_type, FieldType::Unknown("enum".to_string()));

        let other: Field =
            serde_json::from_value(json!({"name": "x", "type": "other", "values": []})).unwrap();
        assert_eq!(other.field_type, FieldType::Other);
    }

    #[test]
    fn test_uninterpreted_keys_survive_round_trip() {
        let raw = json!({
            "refId": "A",
            "schemaHint": "wide",
            "fields": [{
                "name": "level",
                "type": "enum",
                "config": {},
                "values": [1, 3],
                "typeInfo": {"frame": "int64"}
            }],
            "length": 2
        });

        let frame: Frame = serde_json::from_value(raw).unwrap();
        let back = serde_json::to_value(&frame).unwrap();

        assert_eq!(back["schemaHint"], json!("wide"));
        assert_eq!(back["fields"][0]["type"], json!("enum"));
        assert_eq!(back["fields"][0]["typeInfo"], json!({"frame": "int64"}));
    }

    #[test]
    fn test_rectangular_check() {
        let mut frame = Frame::new(vec![
            Field::time("Time", vec![1, 2]),
            Field::string("Line", vec!["a", "b"]),
        ]);
        assert!(frame.is_rectangular());

        frame.fields[1].values.pop();
        assert!(!frame.is_rectangular());
    }

    #[test]
    fn test_first_error_message_prefers_list() {
        let mut response = Response::default();
        assert_eq!(response.first_error_message(), None);

        response.error = Some(QueryError::new("single"));
        assert_eq!(response.first_error_message(), Some("single"));

        response.errors.push(QueryError::new("listed"));
        assert_eq!(response.first_error_message(), Some("listed"));
        assert!(response.has_errors());
    }
}
