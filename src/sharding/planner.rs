//! Shard request planning.
//!
//! A query over a sharded stream is issued as a sequence of sub-requests,
//! each covering a group of shards. The group size adapts to how fast the
//! backend answers, shrinks on timeouts and is retried with exponential
//! backoff once it cannot shrink further.
//!
//! The plan never performs I/O. The caller runs each [`ShardRequest`], then
//! reports the outcome with [`ShardPlan::on_response`] or
//! [`ShardPlan::on_failure`] and follows the returned [`PlanStep`].

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::frame::{LoadingState, Response};
use crate::merge::{find_stat, ResponseAccumulator};
use crate::utils::config::{MergeSettings, ShardingSettings, EXEC_TIME_STAT};

/// Shards covered by one sub-request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardGroup {
    /// Explicit shard values, highest first
    Shards(Vec<u32>),
    /// Streams that carry no shard label, queried once all shards are done
    Unsharded,
}

impl fmt::Display for ShardGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardGroup::Shards(shards) => {
                let list: Vec<String> = shards.iter().map(u32::to_string).collect();
                write!(f, "[{}]", list.join(", "))
            }
            ShardGroup::Unsharded => f.write_str("[unsharded]"),
        }
    }
}

/// One sub-request to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRequest {
    /// Index of the first shard of the group
    pub cycle: usize,
    pub group: ShardGroup,
    pub group_size: usize,
    /// Parent request id with the shard suffix, if the parent had an id
    pub request_id: Option<String>,
}

/// What the caller must do next
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    /// Run this request now
    Query(ShardRequest),
    /// Run this request after `delay`
    Retry {
        request: ShardRequest,
        delay: Duration,
    },
    /// No more requests; the accumulated response ends in `state`
    Done { state: LoadingState },
}

/// How an error reported in a wave affects the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; shrink the group or retry the cycle
    Retriable,
    /// The query itself is broken; stop the plan
    Fatal,
    /// Keep the wave and carry on
    Ignored,
}

/// Classify the first error of a wave by its message
pub fn classify_error(wave: &Response) -> ErrorClass {
    let message = wave.first_error_message().unwrap_or_default().to_lowercase();

    if message.contains("timeout") {
        ErrorClass::Retriable
    } else if message.contains("parse error") || message.contains("maximum of series") {
        ErrorClass::Fatal
    } else {
        ErrorClass::Ignored
    }
}

/// Adaptive plan of sub-requests over a set of shards
///
/// The plan owns the accumulated response: every wave it accepts is folded
/// in with a [`ResponseAccumulator`].
///
/// # Example
/// ```ignore
/// let mut plan = ShardPlan::new(vec![0, 1, 2, 3], Some("q1".to_string()));
/// let mut step = plan.start();
/// while let PlanStep::Query(request) | PlanStep::Retry { request, .. } = step {
///     step = match run(&request) {
///         Ok(wave) => plan.on_response(&wave),
///         Err(_) => plan.on_failure(),
///     };
/// }
/// let merged = plan.response();
/// ```
#[derive(Debug, Clone)]
pub struct ShardPlan {
    shards: Vec<u32>,
    cycle: usize,
    group_size: usize,
    request_id: Option<String>,
    retries: HashMap<usize, u32>,
    settings: ShardingSettings,
    accumulator: ResponseAccumulator,
    stopped: bool,
    finished: Option<LoadingState>,
}

impl ShardPlan {
    /// Create a plan over `shards`
    ///
    /// Shards are queried highest first. With no shards the plan issues a
    /// single unsharded request.
    pub fn new(shards: Vec<u32>, request_id: Option<String>) -> Self {
        Self::with_settings(
            shards,
            request_id,
            ShardingSettings::default(),
            MergeSettings::default(),
        )
    }

    pub fn with_settings(
        mut shards: Vec<u32>,
        request_id: Option<String>,
        settings: ShardingSettings,
        merge_settings: MergeSettings,
    ) -> Self {
        shards.sort_unstable_by(|a, b| b.cmp(a));
        let group_size = initial_group_size(shards.len());
        debug!(
            "Planning {} shards with initial group size {}",
            shards.len(),
            group_size
        );

        Self {
            shards,
            cycle: 0,
            group_size,
            request_id,
            retries: HashMap::new(),
            settings,
            accumulator: ResponseAccumulator::with_settings(merge_settings),
            stopped: false,
            finished: None,
        }
    }

    /// First step of the plan
    pub fn start(&mut self) -> PlanStep {
        if self.stopped || self.finished.is_some() {
            return self.finish();
        }
        PlanStep::Query(self.current_request())
    }

    /// The sub-request for the current cycle and group size
    pub fn current_request(&self) -> ShardRequest {
        let group = if self.cycle >= self.shards.len() {
            ShardGroup::Unsharded
        } else {
            let end = (self.cycle + self.group_size).min(self.shards.len());
            ShardGroup::Shards(self.shards[self.cycle..end].to_vec())
        };

        ShardRequest {
            cycle: self.cycle,
            group,
            group_size: self.group_size,
            request_id: self
                .request_id
                .as_ref()
                .map(|id| format!("{}_shard_{}_{}", id, self.cycle, self.group_size)),
        }
    }

    /// Report the wave returned by the current request
    pub fn on_response(&mut self, wave: &Response) -> PlanStep {
        if self.stopped || self.finished.is_some() {
            return self.finish();
        }

        if wave.has_errors() {
            match classify_error(wave) {
                ErrorClass::Retriable => {
                    if let Some(step) = self.retry() {
                        return step;
                    }
                }
                ErrorClass::Fatal => {
                    warn!(
                        "Stopping plan on error: {}",
                        wave.first_error_message().unwrap_or_default()
                    );
                    self.stopped = true;
                }
                ErrorClass::Ignored => {}
            }
        }

        let next_size = constrain_group_size(
            self.cycle + self.group_size,
            update_group_size(wave, self.group_size),
            self.shards.len(),
            self.settings.max_group_factor,
        );
        if next_size != self.group_size {
            debug!("New group size {}", next_size);
        }

        if let Err(e) = self.accumulator.accumulate(wave) {
            error!("Failed to merge wave for cycle {}: {}", self.cycle, e);
            self.stopped = true;
        }

        self.advance(next_size)
    }

    /// Report a transport failure of the current request
    pub fn on_failure(&mut self) -> PlanStep {
        if self.stopped || self.finished.is_some() {
            return self.finish();
        }

        match self.retry() {
            Some(step) => step,
            None => self.advance(self.group_size),
        }
    }

    /// Stop the plan; the next step reports `Done` with the error state
    pub fn cancel(&mut self) {
        debug!("Plan cancelled at cycle {}", self.cycle);
        self.stopped = true;
    }

    /// Copy of the accumulated response, with the plan's loading state
    pub fn response(&self) -> Response {
        let mut response = self.accumulator.snapshot();
        response.state = Some(self.state());
        response
    }

    pub fn state(&self) -> LoadingState {
        self.finished.unwrap_or(LoadingState::Streaming)
    }

    pub fn shards(&self) -> &[u32] {
        &self.shards
    }

    pub fn cycle(&self) -> usize {
        self.cycle
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Shrink the group, or schedule a delayed retry of the cycle
    ///
    /// Returns `None` once the cycle has used up its retries; the plan is
    /// then stopped.
    fn retry(&mut self) -> Option<PlanStep> {
        if self.group_size > 1 {
            self.group_size = isqrt(self.group_size).max(1);
            debug!("Possible time out, new group size {}", self.group_size);
            return Some(PlanStep::Query(self.current_request()));
        }

        let attempts = self.retries.entry(self.cycle).or_insert(0);
        if *attempts >= self.settings.max_retries {
            warn!(
                "Cycle {} failed after {} retries, stopping",
                self.cycle, attempts
            );
            self.stopped = true;
            return None;
        }

        let delay = backoff_delay(self.settings.backoff_base_ms, *attempts);
        *attempts += 1;
        info!(
            "Retrying cycle {} (attempt {}) in {:?}",
            self.cycle, attempts, delay
        );

        Some(PlanStep::Retry {
            request: self.current_request(),
            delay,
        })
    }

    /// Move past the current group, or finish after the unsharded request
    fn advance(&mut self, next_size: usize) -> PlanStep {
        if self.stopped {
            return self.finish();
        }

        if self.cycle < self.shards.len() {
            self.cycle = (self.cycle + self.group_size).min(self.shards.len());
            self.group_size = next_size;
            return PlanStep::Query(self.current_request());
        }

        self.finish()
    }

    fn finish(&mut self) -> PlanStep {
        let state = if self.stopped {
            LoadingState::Error
        } else {
            LoadingState::Done
        };
        self.finished = Some(state);
        debug!("Plan finished with state {:?}", state);
        PlanStep::Done { state }
    }
}

fn initial_group_size(shard_count: usize) -> usize {
    isqrt(shard_count).max(1)
}

fn isqrt(n: usize) -> usize {
    (n as f64).sqrt().floor() as usize
}

/// Next group size from the backend execution time of a wave
///
/// Fast answers grow the group, slow ones shrink it. An empty wave grows
/// it by one.
pub fn update_group_size(wave: &Response, current: usize) -> usize {
    let Some(first) = wave.data.first() else {
        return current + 1;
    };

    let Some(exec_time) = find_stat(first.stats(), EXEC_TIME_STAT) else {
        return current;
    };
    let seconds = exec_time.value.round();
    let size = current as f64;

    if seconds <= 1.0 {
        (size * 1.5).floor() as usize
    } else if seconds < 6.0 {
        (size * 1.1).ceil() as usize
    } else if current == 1 {
        current
    } else if seconds < 20.0 {
        (size * 0.9).ceil() as usize
    } else {
        current / 2
    }
}

/// Cap a group size to a share of the shards still pending after `next_cycle`
pub fn constrain_group_size(next_cycle: usize, size: usize, shard_count: usize, max_factor: f64) -> usize {
    let pending = shard_count.saturating_sub(next_cycle) as f64;
    let cap = ((pending * max_factor).floor() as usize).max(1);
    size.min(cap)
}

fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(base_ms.saturating_mul(factor))
}
