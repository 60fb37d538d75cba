//! Field-level merge of two frames that share an identity key.
//!
//! Every row of the incoming frame is either folded into the row it
//! matches in the accumulated frame, or inserted at its time-ordered
//! position.
//!
//! A row matches when its timestamp (and nanosecond offset, when both
//! sides carry them) is equal and, if both frames have an identity
//! column, the identities are equal too.

use log::{debug, error, warn};
use serde_json::{Map, Value};

use super::stats::combine_stats;
use crate::frame::{Field, FieldType, Frame, FrameMeta};
use crate::utils::config::MergeSettings;
use crate::utils::error::MergeError;

/// Merge `source` into `dest` in place
///
/// # Errors
/// * `MergeError::MissingTimeField` - if either frame has no time column.
///   `dest` is left untouched.
pub fn merge_frames(
    dest: &mut Frame,
    source: &Frame,
    settings: &MergeSettings,
) -> Result<(), MergeError> {
    let dest_time_idx = dest
        .fields
        .iter()
        .position(|f| f.field_type == FieldType::Time);
    let (Some(dest_time_idx), Some(source_time)) = (dest_time_idx, source.time_field()) else {
        return Err(MergeError::MissingTimeField);
    };

    let dest_id_idx = dest
        .fields
        .iter()
        .position(|f| is_id_field(f, &settings.id_field));
    let source_id = source
        .fields
        .iter()
        .find(|f| is_id_field(f, &settings.id_field));

    // Column pairing does not change while rows are merged
    let pairing: Vec<Option<usize>> = dest
        .fields
        .iter()
        .enumerate()
        .map(|(position, field)| find_source_field(field, &source.fields, position))
        .collect();

    let mut inserted = 0usize;
    let mut accumulated = 0usize;

    for row in 0..source_time.values.len() {
        let Some(target) = time_value(&source_time.values[row]) else {
            warn!(
                "Skipping row {} with non-numeric timestamp {}",
                row, source_time.values[row]
            );
            continue;
        };

        let dest_time = &dest.fields[dest_time_idx];
        let dest_id = dest_id_idx.map(|idx| &dest.fields[idx]);
        let insert_at = resolve_idx(dest_time, source_time, row, target);
        let existing = find_existing(dest_time, dest_id, insert_at, source_time, source_id, row, target);

        for (position, source_idx) in pairing.iter().enumerate() {
            let Some(source_idx) = source_idx else {
                continue;
            };
            let source_field = &source.fields[*source_idx];
            let dest_field = &mut dest.fields[position];

            match existing {
                Some(dest_row) => {
                    if let Some(incoming) = source_field.values.get(row) {
                        accumulate_value(dest_field, dest_row, incoming);
                    }
                }
                None => {
                    if let Some(incoming) = source_field.values.get(row) {
                        insert_value(dest_field, insert_at, incoming, source_field, row);
                    }
                }
            }
        }

        match existing {
            Some(_) => accumulated += 1,
            None => inserted += 1,
        }
    }

    dest.length = dest.fields.first().map_or(0, |f| f.values.len());

    let meta = dest.meta.get_or_insert_with(FrameMeta::default);
    let combined = combine_stats(meta.stats.as_deref().unwrap_or(&[]), source.stats());
    meta.stats = Some(combined);

    debug!(
        "Merged frame: {} rows inserted, {} accumulated, length now {}",
        inserted, accumulated, dest.length
    );

    Ok(())
}

/// Merge a frame pair, logging and skipping on a structural error
///
/// Returns true if the merge was applied.
pub fn merge_frames_or_skip(dest: &mut Frame, source: &Frame, settings: &MergeSettings) -> bool {
    match merge_frames(dest, source, settings) {
        Ok(()) => true,
        Err(e) => {
            error!(
                "{} (frame {:?}, refId {:?}); skipping merge",
                e, source.name, source.ref_id
            );
            false
        }
    }
}

fn is_id_field(field: &Field, id_field: &str) -> bool {
    field.field_type == FieldType::String && field.name == id_field
}

/// Numeric value of a time cell
pub fn time_value(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn time_at(field: &Field, idx: usize) -> Option<f64> {
    field.values.get(idx).and_then(time_value)
}

/// Index of the closest value at or before `target` in a sorted time column
///
/// Among equal values the first one is returned. A target that precedes
/// every value (or an empty column) yields 0.
pub fn closest_idx(target: f64, values: &[Value]) -> usize {
    let first_not_before = values.partition_point(|v| time_value(v).is_some_and(|t| t < target));

    if values
        .get(first_not_before)
        .and_then(time_value)
        .is_some_and(|t| t == target)
    {
        return first_not_before;
    }

    first_not_before.saturating_sub(1)
}

/// Position in `dest_time` where source row `row` belongs
///
/// On an exact timestamp match with nanoseconds on both sides, the row moves
/// past every equal-timestamp entry with a smaller nanosecond offset.
fn resolve_idx(dest_time: &Field, source_time: &Field, row: usize, target: f64) -> usize {
    let mut idx = closest_idx(target, &dest_time.values);

    match time_at(dest_time, idx) {
        Some(current) if current == target => {
            if let (Some(dest_nanos), Some(source_nanos)) = (&dest_time.nanos, &source_time.nanos) {
                let incoming = source_nanos.get(row).copied().unwrap_or(0);
                while time_at(dest_time, idx) == Some(target)
                    && dest_nanos.get(idx).is_some_and(|&n| incoming > n)
                {
                    idx += 1;
                }
            }
            idx
        }
        Some(current) if target > current => idx + 1,
        _ => idx,
    }
}

/// Destination row holding the same event as source row `row`, if any
///
/// Scans the run of entries sharing the row's exact timestamp, starting at
/// `start`, so several events on one timestamp are told apart by identity.
fn find_existing(
    dest_time: &Field,
    dest_id: Option<&Field>,
    start: usize,
    source_time: &Field,
    source_id: Option<&Field>,
    row: usize,
    target: f64,
) -> Option<usize> {
    let mut idx = start;

    while same_timestamp(dest_time, idx, source_time, row, target) {
        match (dest_id, source_id) {
            (Some(dest_id), Some(source_id)) => {
                if let Some(id) = dest_id.values.get(idx) {
                    if Some(id) == source_id.values.get(row) {
                        return Some(idx);
                    }
                }
            }
            // Without identities on both sides, the timestamp decides
            _ => return Some(idx),
        }
        idx += 1;
    }

    None
}

fn same_timestamp(dest_time: &Field, idx: usize, source_time: &Field, row: usize, target: f64) -> bool {
    if time_at(dest_time, idx) != Some(target) {
        return false;
    }

    match (&dest_time.nanos, &source_time.nanos) {
        (Some(dest_nanos), Some(source_nanos)) => {
            dest_nanos.get(idx).is_some() && dest_nanos.get(idx) == source_nanos.get(row)
        }
        _ => true,
    }
}

/// Source column paired with a destination column
///
/// Tries the unique `(name, labels)` match, then the unique name match, then
/// falls back to the same position. The positional fallback is logged since
/// it silently depends on both frames ordering their columns alike.
fn find_source_field(reference: &Field, source_fields: &[Field], position: usize) -> Option<usize> {
    let exact: Vec<usize> = source_fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name == reference.name && f.labels == reference.labels)
        .map(|(idx, _)| idx)
        .collect();
    if let [only] = exact.as_slice() {
        return Some(*only);
    }

    let by_name: Vec<usize> = source_fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name == reference.name)
        .map(|(idx, _)| idx)
        .collect();
    if let [only] = by_name.as_slice() {
        return Some(*only);
    }

    if position < source_fields.len() {
        warn!(
            "Column {:?} has {} name matches in the incoming frame; pairing by position {}",
            reference.name,
            by_name.len(),
            position
        );
        return Some(position);
    }

    None
}

/// Fold an incoming cell into an existing row
fn accumulate_value(dest: &mut Field, idx: usize, incoming: &Value) {
    match dest.field_type {
        FieldType::Time => {}
        FieldType::Number => {
            let sum = add_numbers(dest.values.get(idx), incoming);
            set_value(&mut dest.values, idx, sum);
        }
        FieldType::Other => match incoming {
            Value::Object(incoming) => {
                let mut merged = match dest.values.get(idx) {
                    Some(Value::Object(existing)) => existing.clone(),
                    _ => Map::new(),
                };
                merged.extend(incoming.iter().map(|(k, v)| (k.clone(), v.clone())));
                set_value(&mut dest.values, idx, Value::Object(merged));
            }
            Value::Null => {}
            other => set_value(&mut dest.values, idx, other.clone()),
        },
        FieldType::String | FieldType::Boolean | FieldType::Unknown(_) => {
            set_value(&mut dest.values, idx, incoming.clone());
        }
    }
}

/// Insert an incoming cell (and its nanosecond offset) at `idx`
fn insert_value(dest: &mut Field, idx: usize, incoming: &Value, source: &Field, row: usize) {
    let at = idx.min(dest.values.len());
    dest.values.insert(at, incoming.clone());

    let len = dest.values.len();
    match (&mut dest.nanos, &source.nanos) {
        (nanos, Some(source_nanos)) => {
            let nanos = nanos.get_or_insert_with(|| vec![0; len - 1]);
            let offset = source_nanos.get(row).copied().unwrap_or(0);
            nanos.insert(at.min(nanos.len()), offset);
        }
        // Keep existing offsets aligned with the values
        (Some(nanos), None) => nanos.insert(at.min(nanos.len()), 0),
        (None, None) => {}
    }
}

/// `existing + incoming`, treating a missing or null cell as zero
///
/// Integer inputs stay integers unless the sum overflows.
fn add_numbers(existing: Option<&Value>, incoming: &Value) -> Value {
    let existing = existing.filter(|v| !v.is_null());

    let lhs = existing.map_or(Some(0), Value::as_i64);
    let rhs = if incoming.is_null() {
        Some(0)
    } else {
        incoming.as_i64()
    };
    if let Some(sum) = lhs.zip(rhs).and_then(|(a, b)| a.checked_add(b)) {
        return Value::from(sum);
    }

    let lhs = existing.and_then(Value::as_f64).unwrap_or(0.0);
    let rhs = incoming.as_f64().unwrap_or(0.0);
    Value::from(lhs + rhs)
}

fn set_value(values: &mut Vec<Value>, idx: usize, value: Value) {
    if idx >= values.len() {
        values.resize(idx + 1, Value::Null);
    }
    values[idx] = value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closest_idx() {
        let values = vec![json!(10), json!(20), json!(20), json!(30)];
        assert_eq!(closest_idx(5.0, &values), 0);
        assert_eq!(closest_idx(10.0, &values), 0);
        assert_eq!(closest_idx(15.0, &values), 0);
        assert_eq!(closest_idx(20.0, &values), 1);
        assert_eq!(closest_idx(25.0, &values), 2);
        assert_eq!(closest_idx(99.0, &values), 3);
        assert_eq!(closest_idx(1.0, &[]), 0);
    }

    #[test]
    fn test_add_numbers() {
        assert_eq!(add_numbers(Some(&json!(5)), &json!(5)), json!(10));
        assert_eq!(add_numbers(None, &json!(7)), json!(7));
        assert_eq!(add_numbers(Some(&Value::Null), &json!(7)), json!(7));
        assert_eq!(add_numbers(Some(&json!(3)), &Value::Null), json!(3));
        assert_eq!(add_numbers(Some(&json!(1.5)), &json!(2)), json!(3.5));
        assert_eq!(add_numbers(Some(&json!(i64::MAX)), &json!(1)), json!(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn test_accumulate_structured_merges_objects() {
        let mut field = Field::other("labels", vec![json!({"a": "1", "b": "2"})]);
        accumulate_value(&mut field, 0, &json!({"b": "3", "c": "4"}));
        assert_eq!(field.values[0], json!({"a": "1", "b": "3", "c": "4"}));

        accumulate_value(&mut field, 0, &Value::Null);
        assert_eq!(field.values[0], json!({"a": "1", "b": "3", "c": "4"}));

        accumulate_value(&mut field, 0, &json!("flat"));
        assert_eq!(field.values[0], json!("flat"));
    }

    #[test]
    fn test_accumulate_unknown_type_replaces_even_with_null() {
        let mut field = Field::new("level", FieldType::Unknown("enum".to_string()), vec![3]);
        accumulate_value(&mut field, 0, &Value::Null);
        assert_eq!(field.values, vec![Value::Null]);

        accumulate_value(&mut field, 0, &json!({"a": 1}));
        assert_eq!(field.values, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_accumulate_past_end_extends_column() {
        let mut field = Field::other("labels", vec![json!({"a": "1"})]);
        accumulate_value(&mut field, 2, &json!({"b": "2"}));
        assert_eq!(field.values, vec![json!({"a": "1"}), Value::Null, json!({"b": "2"})]);
    }

    #[test]
    fn test_insert_pads_missing_nanos() {
        let mut dest = Field::time("Time", vec![3, 4]);
        let source = Field::time("Time", vec![1]).with_nanos(vec![111]);
        insert_value(&mut dest, 0, &json!(1), &source, 0);
        assert_eq!(dest.values, vec![json!(1), json!(3), json!(4)]);
        assert_eq!(dest.nanos, Some(vec![111, 0, 0]));
    }

    #[test]
    fn test_insert_keeps_existing_nanos_aligned() {
        let mut dest = Field::time("Time", vec![3, 4]).with_nanos(vec![5, 6]);
        let source = Field::time("Time", vec![1]);
        insert_value(&mut dest, 2, &json!(9), &source, 0);
        assert_eq!(dest.nanos, Some(vec![5, 6, 0]));
    }

    #[test]
    fn test_insert_clamps_to_short_column() {
        let mut dest = Field::string("Line", vec!["a"]);
        let source = Field::string("Line", vec!["b"]);
        insert_value(&mut dest, 5, &json!("b"), &source, 0);
        assert_eq!(dest.values, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_find_source_field_prefers_labels() {
        let reference = Field::number("Value", vec![1]).with_labels([("test", "true")]);
        let source = vec![
            Field::time("Time", vec![1]),
            Field::number("Value", vec![1]).with_labels([("level", "debug")]),
            Field::number("Value", vec![2]).with_labels([("test", "true")]),
        ];
        assert_eq!(find_source_field(&reference, &source, 1), Some(2));
    }

    #[test]
    fn test_find_source_field_by_name_when_reordered() {
        let reference = Field::string("id", Vec::<&str>::new());
        let source = vec![
            Field::string("id", Vec::<&str>::new()),
            Field::time("Time", Vec::<i64>::new()),
        ];
        assert_eq!(find_source_field(&reference, &source, 1), Some(0));
    }

    #[test]
    fn test_find_source_field_positional_fallback() {
        let reference = Field::number("Value", vec![1]);
        let source = vec![
            Field::time("Time", vec![1]),
            Field::number("Value", vec![1]),
            Field::number("Value", vec![2]),
        ];
        assert_eq!(find_source_field(&reference, &source, 2), Some(2));
        assert_eq!(find_source_field(&reference, &source, 7), None);
    }

    #[test]
    fn test_missing_time_field_leaves_dest_untouched() {
        let mut dest = Frame::new(vec![Field::string("Line", vec!["a"])]);
        let before = dest.clone();
        let source = Frame::new(vec![Field::time("Time", vec![1])]);

        let result = merge_frames(&mut dest, &source, &MergeSettings::default());
        assert_eq!(result, Err(MergeError::MissingTimeField));
        assert_eq!(dest, before);
        assert!(!merge_frames_or_skip(&mut dest, &source, &MergeSettings::default()));
    }

    #[test]
    fn test_same_timestamp_rows_told_apart_by_id() {
        let mut dest = Frame::new(vec![
            Field::time("Time", vec![5, 5]),
            Field::string("Line", vec!["a", "b"]),
            Field::string("id", vec!["ida", "idb"]),
        ]);
        let source = Frame::new(vec![
            Field::time("Time", vec![5]),
            Field::string("Line", vec!["b2"]),
            Field::string("id", vec!["idb"]),
        ]);

        merge_frames(&mut dest, &source, &MergeSettings::default()).unwrap();
        assert_eq!(dest.length, 2);
        assert_eq!(dest.fields[1].values, vec![json!("a"), json!("b2")]);
    }

    #[test]
    fn test_non_numeric_timestamp_row_is_skipped() {
        let mut dest = Frame::new(vec![Field::time("Time", vec![1])]);
        let source = Frame::new(vec![Field::new(
            "Time",
            FieldType::Time,
            vec![json!("yesterday"), json!(2)],
        )]);

        merge_frames(&mut dest, &source, &MergeSettings::default()).unwrap();
        assert_eq!(dest.fields[0].values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_custom_id_field() {
        let settings = MergeSettings {
            id_field: "rowId".to_string(),
        };
        let mut dest = Frame::new(vec![
            Field::time("Time", vec![1]),
            Field::string("rowId", vec!["x"]),
        ]);
        let source = Frame::new(vec![
            Field::time("Time", vec![1]),
            Field::string("rowId", vec!["y"]),
        ]);

        merge_frames(&mut dest, &source, &settings).unwrap();
        assert_eq!(dest.length, 2);
    }
}
