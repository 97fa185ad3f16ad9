//! Scale-and-update reward arithmetic.
//!
//! Both the single-reward and bulk-reward paths normalize by a running
//! maximum so that downstream consumers (UCB1 in particular) see a mean
//! bounded in `[0, 1]` regardless of the raw reward scale.

use crate::model::ArmState;

/// Result of applying a reward update: the new arm state plus the
/// experiment's updated running maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardOutcome {
    pub arm: ArmState,
    pub max_reward: f64,
}

fn normalize(value: f64, lower_bound: f64, max_reward: f64) -> f64 {
    if max_reward == lower_bound {
        // Degenerate 0/0 fraction: spec.md §4.2/§4.5 pin this to `s = L`.
        lower_bound
    } else {
        (value - lower_bound) / (max_reward - lower_bound)
    }
}

/// Single-reward scale-and-update.
pub fn apply_single(
    arm: ArmState,
    max_reward: f64,
    lower_bound: f64,
    reward: f64,
) -> RewardOutcome {
    let clamped = reward.max(lower_bound);
    let new_max = max_reward.max(clamped);
    let scaled = normalize(clamped, lower_bound, new_max);

    let delta = scaled - arm.mean_reward;
    let new_n = arm.n + 1;
    let new_mean = arm.mean_reward + delta / new_n as f64;

    RewardOutcome {
        arm: ArmState {
            n: new_n,
            mean_reward: new_mean,
            deleted: arm.deleted,
        },
        max_reward: new_max,
    }
}

/// Pre-aggregated `{mean, max, count}` batch, merged via a parallel-variance
/// update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkRewardInput {
    pub mean: f64,
    pub max: f64,
    pub count: u64,
}

pub fn apply_bulk(
    arm: ArmState,
    max_reward: f64,
    lower_bound: f64,
    batch: BulkRewardInput,
) -> RewardOutcome {
    let clamped_mean = batch.mean.max(lower_bound);
    let clamped_max = batch.max.max(lower_bound);
    let new_max = max_reward.max(clamped_max);
    let scaled = normalize(clamped_mean, lower_bound, new_max);

    let delta = scaled - arm.mean_reward;
    let new_n = arm.n + batch.count;
    let new_mean = arm.mean_reward + delta * (batch.count as f64 / new_n as f64);

    RewardOutcome {
        arm: ArmState {
            n: new_n,
            mean_reward: new_mean,
            deleted: arm.deleted,
        },
        max_reward: new_max,
    }
}
