//! wavefold
//!
//! Incremental merging of streamed query responses. A query backend answers
//! in waves (one per shard group or polling tick); each wave is folded into
//! an accumulated response that stays time-ordered, deduplicated for event
//! rows and additive for numeric series.
//!
//! This crate provides the core implementation for the `wavefold` CLI tool.
//!
//! ## Getting Started
//!
//! ```ignore
//! use wavefold::merge::ResponseAccumulator;
//!
//! let mut accumulator = ResponseAccumulator::new();
//! for wave in waves {
//!     accumulator.accumulate(&wave)?;
//! }
//! let merged = accumulator.snapshot();
//! ```

pub mod commands;
pub mod frame;
pub mod merge;
pub mod output;
pub mod sharding;
pub mod utils;
