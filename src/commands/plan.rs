//! Plan command implementation.
//!
//! Runs a shard plan against simulated successful waves and prints the
//! sub-requests it issues.

use super::models::PlanArgs;
use crate::frame::{Field, Frame, FrameMeta, Response, Stat};
use crate::sharding::{PlanStep, ShardPlan, ShardRequest};
use crate::utils::config::{load_config, WavefoldConfig, EXEC_TIME_STAT};
use anyhow::{Context, Result};
use log::info;

/// Execute the plan command
///
/// Every simulated wave succeeds. Without `exec_time` the waves are empty,
/// which grows the group by one per request.
///
/// # Returns
/// The requests in the order the plan issued them
pub fn execute_plan(args: PlanArgs) -> Result<Vec<ShardRequest>> {
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => WavefoldConfig::default(),
    };

    let mut plan = ShardPlan::with_settings(
        args.shards.clone(),
        args.request_id.clone(),
        config.sharding,
        config.merge,
    );
    info!(
        "Planning {} shards, initial group size {}",
        plan.shards().len(),
        plan.group_size()
    );

    let wave = simulated_wave(args.exec_time);
    let mut requests = Vec::new();
    let mut step = plan.start();

    while let PlanStep::Query(request) | PlanStep::Retry { request, .. } = step {
        println!(
            "cycle {:>4}  size {:>3}  shards {}{}",
            request.cycle,
            request.group_size,
            request.group,
            request
                .request_id
                .as_deref()
                .map(|id| format!("  id {}", id))
                .unwrap_or_default()
        );
        requests.push(request);
        step = plan.on_response(&wave);
    }

    if let PlanStep::Done { state } = step {
        info!("Plan finished after {} requests ({:?})", requests.len(), state);
    }

    Ok(requests)
}

fn simulated_wave(exec_time: Option<f64>) -> Response {
    match exec_time {
        Some(seconds) => {
            let frame = Frame::new(vec![Field::time("Time", Vec::<i64>::new())])
                .with_ref_id("A")
                .with_meta(FrameMeta::default().with_stats(vec![Stat::new(EXEC_TIME_STAT, seconds)]));
            Response::with_frames(vec![frame])
        }
        None => Response::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::ShardGroup;

    #[test]
    fn test_plan_covers_every_shard_once() {
        let requests = execute_plan(PlanArgs {
            shards: (0..10).collect(),
            ..Default::default()
        })
        .unwrap();

        let mut covered: Vec<u32> = requests
            .iter()
            .filter_map(|r| match &r.group {
                ShardGroup::Shards(shards) => Some(shards.clone()),
                ShardGroup::Unsharded => None,
            })
            .flatten()
            .collect();
        covered.sort_unstable();

        assert_eq!(covered, (0..10).collect::<Vec<_>>());
        assert_eq!(requests.last().map(|r| &r.group), Some(&ShardGroup::Unsharded));
    }

    #[test]
    fn test_plan_without_shards_is_one_request() {
        let requests = execute_plan(PlanArgs::default()).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].group, ShardGroup::Unsharded);
    }
}
