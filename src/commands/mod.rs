//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod merge;
pub mod models;
pub mod plan;
pub mod utils;

// Re-export main command functions
pub use merge::{execute_merge, validate_args};
pub use models::{parse_shards, MergeArgs, PlanArgs};
pub use plan::execute_plan;
pub use utils::{check_response, display_version, validate_response_file, FrameReport};
