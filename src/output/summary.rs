//! Terminal summary of a merged response.

use crate::frame::{resolve_frame_key, Frame, FrameKind, Response};
use crate::merge::find_stat;
use crate::utils::config::TOTAL_BYTES_STAT;
use chrono::{DateTime, SecondsFormat, Utc};
use colored::*;

/// Render a human-readable summary of a merged response for the terminal
pub fn render_merge_summary(response: &Response, waves: usize) -> String {
    let mut out = String::new();

    out.push_str(&render_header(response, waves));
    for frame in &response.data {
        out.push_str(&render_frame(frame));
    }
    out.push_str(&render_status(response));

    out
}

fn render_header(response: &Response, waves: usize) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&"Merged Response Summary".bold().to_string());
    out.push_str("\n---------------------------------------------------\n");
    out.push_str(&format!("Waves:     {}\n", waves));
    out.push_str(&format!("Frames:    {}\n", response.data.len()));
    out.push_str(&format!("Rows:      {}\n", total_rows(response)));
    if let Some((from, to)) = time_span(response) {
        out.push_str(&format!("Span:      {} -> {}\n", from, to));
    }
    if !response.trace_ids.is_empty() {
        out.push_str(&format!("Traces:    {}\n", response.trace_ids.join(", ")));
    }
    out.push_str(&format!(
        "Generated: {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str("---------------------------------------------------\n");
    out
}

fn render_frame(frame: &Frame) -> String {
    let key = resolve_frame_key(frame)
        .map(|k| k.to_string())
        .unwrap_or_else(|| "<no identity>".to_string());
    let kind = FrameKind::of(frame)
        .map(|k| k.to_string())
        .unwrap_or_else(|_| frame.frame_type().unwrap_or_default().to_string());

    let mut line = format!("  {} [{}] {} rows", key.cyan(), kind, frame.length);
    if let Some(bytes) = find_stat(frame.stats(), TOTAL_BYTES_STAT) {
        line.push_str(&format!(", {} bytes processed", bytes.value));
    }
    if !frame.is_rectangular() {
        line.push_str(&format!(" {}", "(ragged columns)".yellow()));
    }
    line.push('\n');
    line
}

fn render_status(response: &Response) -> String {
    let status = match response.first_error_message() {
        Some(message) => format!("{} error(s), first: {}", error_count(response), message)
            .red()
            .bold(),
        None => "No errors reported".green().bold(),
    };
    format!("\n{}\n", status)
}

fn error_count(response: &Response) -> usize {
    if response.errors.is_empty() {
        usize::from(response.error.is_some())
    } else {
        response.errors.len()
    }
}

/// Sum of frame lengths
pub fn total_rows(response: &Response) -> usize {
    response.data.iter().map(|f| f.length).sum()
}

/// Earliest and latest timestamps across all frames, as RFC 3339 strings
///
/// Time columns are sorted, so the first and last cell of each one bound it.
pub fn time_span(response: &Response) -> Option<(String, String)> {
    let bounds = response
        .data
        .iter()
        .filter_map(|frame| frame.time_field())
        .filter_map(|field| {
            let first = field.values.first().and_then(|v| v.as_f64())?;
            let last = field.values.last().and_then(|v| v.as_f64())?;
            Some((first, last))
        });

    let (from, to) = bounds.fold(None, |acc: Option<(f64, f64)>, (first, last)| match acc {
        None => Some((first, last)),
        Some((from, to)) => Some((from.min(first), to.max(last))),
    })?;

    Some((format_millis(from)?, format_millis(to)?))
}

/// Epoch milliseconds as an RFC 3339 timestamp
///
/// Fractional milliseconds are truncated to the displayed precision.
pub fn format_millis(millis: f64) -> Option<String> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis.floor() as i64)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Field, FieldType, QueryError};

    fn response() -> Response {
        Response::with_frames(vec![
            Frame::new(vec![Field::time("Time", vec![1_000, 5_000])]).with_ref_id("A"),
            Frame::new(vec![Field::time("Time", vec![0, 2_000, 3_000])]).with_ref_id("B"),
        ])
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0.0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(
            format_millis(1_700_000_000_123.0).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
        assert_eq!(format_millis(f64::NAN), None);
    }

    #[test]
    fn test_time_span_covers_all_frames() {
        let (from, to) = time_span(&response()).unwrap();
        assert_eq!(from, "1970-01-01T00:00:00.000Z");
        assert_eq!(to, "1970-01-01T00:00:05.000Z");
        assert_eq!(time_span(&Response::default()), None);
    }

    #[test]
    fn test_time_span_includes_fractional_times() {
        let fractional = Field::new("Time", FieldType::Time, vec![500.5, 7_250.75]);
        let mut merged = response();
        merged.data.push(Frame::new(vec![fractional]).with_ref_id("C"));

        let (from, to) = time_span(&merged).unwrap();
        assert_eq!(from, "1970-01-01T00:00:00.000Z");
        assert_eq!(to, "1970-01-01T00:00:07.250Z");

        let only_fractional = Response::with_frames(vec![Frame::new(vec![Field::new(
            "Time",
            FieldType::Time,
            vec![1_500.5, 2_500.25],
        )])]);
        let (from, to) = time_span(&only_fractional).unwrap();
        assert_eq!(from, "1970-01-01T00:00:01.500Z");
        assert_eq!(to, "1970-01-01T00:00:02.500Z");
    }

    #[test]
    fn test_summary_mentions_counts_and_errors() {
        colored::control::set_override(false);

        let mut merged = response();
        merged.errors = vec![QueryError::new("timeout")];
        let summary = render_merge_summary(&merged, 3);

        assert!(summary.contains("Waves:     3"));
        assert!(summary.contains("Rows:      5"));
        assert!(summary.contains("1 error(s), first: timeout"));
        assert!(summary.contains("A [rows] 2 rows"));
    }
}
