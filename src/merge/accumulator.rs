//! Folding of response waves into an accumulated response.
//!
//! A wave is ingested first: every frame is classified and keyed before
//! anything is mutated, so a wave that fails ingestion leaves the
//! accumulated response exactly as it was.

use log::debug;
use std::collections::HashMap;

use super::fields::merge_frames_or_skip;
use crate::frame::{resolve_and_memoize, resolve_frame_key, Frame, FrameKey, FrameKind, Response};
use crate::utils::config::MergeSettings;
use crate::utils::error::MergeError;

/// An incoming frame, classified and keyed
#[derive(Debug)]
struct IncomingFrame<'a> {
    kind: FrameKind,
    key: FrameKey,
    frame: &'a Frame,
}

/// Accumulated frame positions by kind and identity
type FrameIndex = HashMap<(FrameKind, FrameKey), usize>;

/// Combine a new wave into the previously accumulated response
///
/// With no previous response the wave is deep-cloned and returned as the
/// seed; no merge logic runs.
///
/// # Errors
/// * `MergeError::UnknownFrameType` - a frame declares an unsupported kind
/// * `MergeError::MissingIdentity` - a frame cannot be keyed
///
/// # Example
/// ```ignore
/// let mut merged = None;
/// for wave in waves {
///     merged = Some(combine(merged, &wave)?);
/// }
/// ```
pub fn combine(previous: Option<Response>, next: &Response) -> Result<Response, MergeError> {
    match previous {
        None => Ok(clone_query_response(next)),
        Some(mut accumulated) => {
            fold_wave(&mut accumulated, next, &MergeSettings::default())?;
            Ok(accumulated)
        }
    }
}

/// Deep clone of a response, sharing nothing with the original
pub fn clone_query_response(response: &Response) -> Response {
    response.clone()
}

/// Owner of the accumulated response for one query execution
///
/// Waves go in through [`ResponseAccumulator::accumulate`]; readers get
/// copies through [`ResponseAccumulator::snapshot`].
#[derive(Debug, Clone, Default)]
pub struct ResponseAccumulator {
    current: Option<Response>,
    settings: MergeSettings,
    waves: usize,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: MergeSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Fold one wave into the accumulated response
    ///
    /// On error the accumulated response is unchanged and the wave is not
    /// counted.
    pub fn accumulate(&mut self, next: &Response) -> Result<(), MergeError> {
        match self.current.as_mut() {
            None => self.current = Some(clone_query_response(next)),
            Some(accumulated) => fold_wave(accumulated, next, &self.settings)?,
        }
        self.waves += 1;
        Ok(())
    }

    /// Copy of the accumulated response (empty before the first wave)
    pub fn snapshot(&self) -> Response {
        self.current.clone().unwrap_or_default()
    }

    pub fn current(&self) -> Option<&Response> {
        self.current.as_ref()
    }

    pub fn into_response(self) -> Option<Response> {
        self.current
    }

    /// Drop the accumulated response, e.g. when a new query starts
    pub fn reset(&mut self) {
        self.current = None;
        self.waves = 0;
    }

    /// Number of waves accumulated since creation or the last reset
    pub fn wave_count(&self) -> usize {
        self.waves
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }
}

/// Ingest `next` and fold it into `accumulated`
fn fold_wave(
    accumulated: &mut Response,
    next: &Response,
    settings: &MergeSettings,
) -> Result<(), MergeError> {
    let incoming = ingest_wave(next)?;

    debug!(
        "Folding wave with {} frames into {} accumulated frames",
        incoming.len(),
        accumulated.data.len()
    );

    let mut index = build_index(&mut accumulated.data);

    for frame in incoming {
        match frame.kind {
            FrameKind::Series => fold_series_frame(accumulated, &mut index, frame, settings),
            FrameKind::Rows => fold_row_frame(accumulated, &mut index, frame, settings),
        }
    }

    combine_errors(accumulated, next);

    Ok(())
}

/// Classify and key every frame of a wave
fn ingest_wave(next: &Response) -> Result<Vec<IncomingFrame<'_>>, MergeError> {
    next.data
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let kind = FrameKind::of(frame)?;
            let key = resolve_frame_key(frame).ok_or(MergeError::MissingIdentity { index })?;
            Ok(IncomingFrame { kind, key, frame })
        })
        .collect()
}

/// Index accumulated frames by kind and key
///
/// Series frames get their label-derived name memoized. Frames that cannot
/// be classified or keyed are left out and never receive merges.
fn build_index(frames: &mut [Frame]) -> FrameIndex {
    let mut index = FrameIndex::new();

    for (position, frame) in frames.iter_mut().enumerate() {
        let Ok(kind) = FrameKind::of(frame) else {
            debug!("Accumulated frame {} has an unknown kind, not indexed", position);
            continue;
        };
        let key = match kind {
            FrameKind::Series => resolve_and_memoize(frame),
            FrameKind::Rows => resolve_frame_key(frame),
        };
        match key {
            Some(key) => {
                index.entry((kind, key)).or_insert(position);
            }
            None => debug!("Accumulated frame {} has no identity, not indexed", position),
        }
    }

    index
}

/// Additive numeric series: sum values on shared timestamps
fn fold_series_frame(
    accumulated: &mut Response,
    index: &mut FrameIndex,
    incoming: IncomingFrame<'_>,
    settings: &MergeSettings,
) {
    match index.get(&(incoming.kind, incoming.key.clone())) {
        Some(&position) => {
            debug!("Merging series frame {}", incoming.key);
            merge_frames_or_skip(&mut accumulated.data[position], incoming.frame, settings);
        }
        None => {
            let mut frame = incoming.frame.clone();
            resolve_and_memoize(&mut frame);
            append_frame(accumulated, index, incoming.kind, incoming.key, frame);
        }
    }
}

/// Event rows: deduplicate by time and identity
fn fold_row_frame(
    accumulated: &mut Response,
    index: &mut FrameIndex,
    incoming: IncomingFrame<'_>,
    settings: &MergeSettings,
) {
    match index.get(&(incoming.kind, incoming.key.clone())) {
        Some(&position) => {
            debug!("Merging row frame {}", incoming.key);
            merge_frames_or_skip(&mut accumulated.data[position], incoming.frame, settings);
        }
        None => {
            let frame = incoming.frame.clone();
            append_frame(accumulated, index, incoming.kind, incoming.key, frame);
        }
    }
}

fn append_frame(
    accumulated: &mut Response,
    index: &mut FrameIndex,
    kind: FrameKind,
    key: FrameKey,
    frame: Frame,
) {
    debug!("Appending new {} frame {}", kind, key);
    index.insert((kind, key), accumulated.data.len());
    accumulated.data.push(frame);
}

/// Concatenate errors and trace ids; keep the earliest single error
fn combine_errors(accumulated: &mut Response, next: &Response) {
    accumulated.errors.extend(next.errors.iter().cloned());

    if accumulated.error.is_none() {
        accumulated.error = next
            .error
            .clone()
            .or_else(|| accumulated.errors.first().cloned());
    }

    accumulated.trace_ids.extend(next.trace_ids.iter().cloned());
}
