//! Storage backend capability set: arm state CRUD, parameter CRUD,
//! max-reward tracking, choose-counter, and atomic reward-application
//! primitives. Two implementations: `memory` (single-process, copy-on-write
//! map) and `remote` (Redis, atomic server-side scripts).

pub mod memory;
pub mod remote;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::error::BanditResult;
use crate::model::{ArmState, Parameters};
use crate::reward_math::BulkRewardInput;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn exists_experiment(&self, experiment: &str) -> BanditResult<bool>;

    /// No-op if the experiment already exists.
    async fn init_experiment(
        &self,
        experiment: &str,
        params: &Parameters,
        arm_names: &[String],
    ) -> BanditResult<()>;

    async fn get_params(&self, experiment: &str) -> BanditResult<Option<Parameters>>;

    /// Live (non-deleted) arm states only.
    async fn get_arm_states(&self, experiment: &str) -> BanditResult<BTreeMap<String, ArmState>>;

    /// Live (non-deleted) arm names only.
    async fn get_arm_names(&self, experiment: &str) -> BanditResult<BTreeSet<String>>;

    /// Creates the arm with default state, or clears `deleted` if it was
    /// soft-deleted (restoring its prior state).
    async fn create_arm(&self, experiment: &str, arm: &str) -> BanditResult<()>;

    /// Marks the arm `deleted`, preserving its state.
    async fn soft_delete_arm(&self, experiment: &str, arm: &str) -> BanditResult<()>;

    /// Permanently removes the arm and its state; it cannot be restored.
    async fn hard_delete_arm(&self, experiment: &str, arm: &str) -> BanditResult<()>;

    /// Applies the single-reward update atomically. Silently a no-op if
    /// the arm is absent (hard-deleted or never created).
    async fn record_reward(
        &self,
        experiment: &str,
        arm: &str,
        lower_bound: f64,
        reward: f64,
    ) -> BanditResult<()>;

    /// Applies the bulk-reward update atomically. Same ignore-if-absent
    /// policy as `record_reward`.
    async fn bulk_reward(
        &self,
        experiment: &str,
        arm: &str,
        lower_bound: f64,
        batch: BulkRewardInput,
    ) -> BanditResult<()>;

    /// Atomically increments and returns the new choose-count.
    async fn incr_choose_count(&self, experiment: &str) -> BanditResult<u64>;

    /// Reads the current choose-count without mutating it.
    async fn get_choose_count(&self, experiment: &str) -> BanditResult<u64>;

    /// Removes all experiments owned by this backend.
    async fn reset(&self) -> BanditResult<()>;
}
