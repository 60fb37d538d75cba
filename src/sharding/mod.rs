//! Adaptive planning of shard sub-requests.
//!
//! This module decides which shards each sub-request covers, how the group
//! size evolves with backend latency, and when to retry or stop. Every wave
//! accepted by the plan is folded into its accumulated response.

mod planner;

pub use planner::{
    classify_error, constrain_group_size, update_group_size, ErrorClass, PlanStep, ShardGroup,
    ShardPlan, ShardRequest,
};
