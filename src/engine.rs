//! Engine façade: the public surface of the library. Validates
//! inputs against their schemas, then dispatches on `Parameters::algorithm`
//! to the matching policy.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{BanditError, BanditResult};
use crate::key;
use crate::model::{Algorithm, ArmState, Parameters};
use crate::policy::epsilon_greedy::EpsilonGreedy;
use crate::policy::random::Random;
use crate::policy::softmax::Softmax;
use crate::policy::ucb1::Ucb1;
use crate::policy::{AlgorithmPolicy, RewardHook};
use crate::reward_math::BulkRewardInput;
use crate::rng::EntropySource;
use crate::storage::StorageBackend;

/// Full learner spec for `init`: algorithm, arm names, and maximize/bound.
#[derive(Debug, Clone)]
pub struct InitRequest {
    pub experiment_name: String,
    pub algorithm: Algorithm,
    pub arm_names: Vec<String>,
    pub maximize: bool,
    pub reward_lower_bound: f64,
}

impl InitRequest {
    fn validate(&self) -> BanditResult<()> {
        key::validate_name(&self.experiment_name)?;
        if self.arm_names.is_empty() {
            return Err(BanditError::InvalidParameters(
                "armNames must be non-empty".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for name in &self.arm_names {
            key::validate_name(name)?;
            if !seen.insert(name) {
                return Err(BanditError::InvalidParameters(format!(
                    "duplicate arm name {name:?}"
                )));
            }
        }
        if !self.reward_lower_bound.is_finite() {
            return Err(BanditError::InvalidParameters(
                "rewardLowerBound must be finite".into(),
            ));
        }
        self.algorithm.validate()
    }

    fn into_parameters(self) -> Parameters {
        Parameters {
            algorithm: self.algorithm,
            maximize: self.maximize,
            reward_lower_bound: self.reward_lower_bound,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RewardRequest {
    pub arm_name: String,
    pub reward_value: f64,
}

impl RewardRequest {
    fn validate(&self) -> BanditResult<()> {
        key::validate_name(&self.arm_name)?;
        if !self.reward_value.is_finite() {
            return Err(BanditError::InvalidReward(format!(
                "rewardValue must be finite, got {}",
                self.reward_value
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BulkRewardRequest {
    pub arm_name: String,
    pub mean: f64,
    pub max: f64,
    pub count: u64,
}

impl BulkRewardRequest {
    fn validate(&self) -> BanditResult<()> {
        key::validate_name(&self.arm_name)?;
        if self.count < 1 {
            return Err(BanditError::InvalidReward(
                "count must be >= 1".into(),
            ));
        }
        if !self.mean.is_finite() || !self.max.is_finite() {
            return Err(BanditError::InvalidReward(
                "mean and max must be finite".into(),
            ));
        }
        if self.mean > self.max {
            return Err(BanditError::InvalidReward(format!(
                "mean ({}) must be <= max ({})",
                self.mean, self.max
            )));
        }
        Ok(())
    }
}

fn policy_for(algorithm: &Algorithm) -> Box<dyn AlgorithmPolicy + Send + Sync> {
    match algorithm {
        Algorithm::EpsilonGreedy { .. } => Box::new(EpsilonGreedy),
        Algorithm::Ucb1 { .. } => Box::new(Ucb1),
        Algorithm::Softmax { .. } => Box::new(Softmax),
        Algorithm::Random => Box::new(Random),
    }
}

/// The engine façade, generic over the storage backend so the memory and
/// remote implementations are interchangeable at the call site.
pub struct BanditEngine<S: StorageBackend> {
    storage: S,
}

impl<S: StorageBackend> BanditEngine<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Idempotent: a no-op if the experiment already exists.
    pub async fn init(&self, request: InitRequest) -> BanditResult<()> {
        if let Err(e) = request.validate() {
            warn!(experiment = %request.experiment_name, error = %e, "init rejected: invalid request");
            return Err(e);
        }
        if self.storage.exists_experiment(&request.experiment_name).await? {
            return Ok(());
        }
        let experiment_name = request.experiment_name.clone();
        let arm_names = request.arm_names.clone();
        let params = request.into_parameters();
        self.storage
            .init_experiment(&experiment_name, &params, &arm_names)
            .await
    }

    /// Returns `None` if the experiment has no live arms.
    pub async fn choose(
        &self,
        experiment_name: &str,
        rng: &mut dyn EntropySource,
    ) -> BanditResult<Option<String>> {
        let live = self.storage.get_arm_states(experiment_name).await?;
        if live.is_empty() {
            return Ok(None);
        }
        let params = self
            .storage
            .get_params(experiment_name)
            .await?
            .ok_or_else(|| BanditError::Storage(format!("unknown experiment {experiment_name:?}")))?;

        let choose_count = self.storage.get_choose_count(experiment_name).await?;
        let policy = policy_for(&params.algorithm);
        let picked = policy.choose(&live, &params, choose_count, rng);
        self.storage.incr_choose_count(experiment_name).await?;
        Ok(picked)
    }

    /// Silently ignored if the arm is absent or hard-deleted.
    pub async fn reward(
        &self,
        experiment_name: &str,
        request: RewardRequest,
    ) -> BanditResult<()> {
        if let Err(e) = request.validate() {
            warn!(experiment = experiment_name, arm = %request.arm_name, error = %e, "reward rejected: invalid request");
            return Err(e);
        }
        let params = match self.storage.get_params(experiment_name).await? {
            Some(p) => p,
            None => return Ok(()),
        };
        let policy = policy_for(&params.algorithm);
        if policy.reward_hook() == RewardHook::Noop {
            return Ok(());
        }
        self.storage
            .record_reward(
                experiment_name,
                &request.arm_name,
                params.reward_lower_bound,
                request.reward_value,
            )
            .await
    }

    /// Silently ignored if the arm is absent or hard-deleted.
    pub async fn bulk_reward(
        &self,
        experiment_name: &str,
        request: BulkRewardRequest,
    ) -> BanditResult<()> {
        if let Err(e) = request.validate() {
            warn!(experiment = experiment_name, arm = %request.arm_name, error = %e, "bulk reward rejected: invalid request");
            return Err(e);
        }
        let params = match self.storage.get_params(experiment_name).await? {
            Some(p) => p,
            None => return Ok(()),
        };
        let policy = policy_for(&params.algorithm);
        if policy.reward_hook() == RewardHook::Noop {
            return Ok(());
        }
        self.storage
            .bulk_reward(
                experiment_name,
                &request.arm_name,
                params.reward_lower_bound,
                BulkRewardInput {
                    mean: request.mean,
                    max: request.max,
                    count: request.count,
                },
            )
            .await
    }

    pub async fn create_arm(&self, experiment_name: &str, arm_name: &str) -> BanditResult<()> {
        if let Err(e) = key::validate_name(arm_name) {
            warn!(experiment = experiment_name, arm = arm_name, error = %e, "create_arm rejected: invalid name");
            return Err(e);
        }
        self.storage.create_arm(experiment_name, arm_name).await
    }

    pub async fn soft_delete_arm(&self, experiment_name: &str, arm_name: &str) -> BanditResult<()> {
        self.storage.soft_delete_arm(experiment_name, arm_name).await
    }

    pub async fn hard_delete_arm(&self, experiment_name: &str, arm_name: &str) -> BanditResult<()> {
        self.storage.hard_delete_arm(experiment_name, arm_name).await
    }

    /// The distribution the next `choose` would sample from, over live arms.
    /// Read-only: does not touch `chooseCount`.
    pub async fn arm_selection_probabilities(
        &self,
        experiment_name: &str,
    ) -> BanditResult<BTreeMap<String, f64>> {
        let live = self.storage.get_arm_states(experiment_name).await?;
        if live.is_empty() {
            return Ok(BTreeMap::new());
        }
        let params = self
            .storage
            .get_params(experiment_name)
            .await?
            .ok_or_else(|| BanditError::Storage(format!("unknown experiment {experiment_name:?}")))?;
        let choose_count = self.storage.get_choose_count(experiment_name).await?;
        let policy = policy_for(&params.algorithm);
        Ok(policy.selection_probabilities(&live, &params, choose_count))
    }

    pub async fn get_arm_states(&self, experiment_name: &str) -> BanditResult<BTreeMap<String, ArmState>> {
        self.storage.get_arm_states(experiment_name).await
    }

    pub async fn get_arm_names(&self, experiment_name: &str) -> BanditResult<std::collections::BTreeSet<String>> {
        self.storage.get_arm_names(experiment_name).await
    }

    pub async fn reset(&self) -> BanditResult<()> {
        self.storage.reset().await
    }
}
