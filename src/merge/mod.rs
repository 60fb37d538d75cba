//! Incremental merging of query-result waves.
//!
//! Each wave from a streaming or sharded query execution is folded into a
//! running accumulated response:
//! - series frames sum their values on shared timestamps
//! - row frames insert new events in time order and deduplicate
//!   events already seen
//! - errors and trace ids are concatenated
//!
//! # Example
//! ```ignore
//! use wavefold::merge::ResponseAccumulator;
//!
//! let mut acc = ResponseAccumulator::new();
//! for wave in waves {
//!     acc.accumulate(&wave)?;
//! }
//! let merged = acc.snapshot();
//! ```

mod accumulator;
mod fields;
mod stats;

// Public API exports
pub use accumulator::{clone_query_response, combine, ResponseAccumulator};
pub use fields::{closest_idx, merge_frames, merge_frames_or_skip};
pub use stats::{combine_stats, find_stat};
