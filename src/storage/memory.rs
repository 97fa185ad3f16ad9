//! In-process storage backend: one `ArcSwap`-held copy-on-write map of
//! experiments, mutated via compare-and-swap loops. No
//! shared lock is held across unrelated experiments — each failed CAS only
//! retries the clone-and-mutate, it never blocks other callers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::debug;

use super::StorageBackend;
use crate::error::{BanditError, BanditResult};
use crate::model::{ArmState, Parameters, DEFAULT_MAX_REWARD};
use crate::reward_math::{self, BulkRewardInput};

#[derive(Clone)]
struct ExperimentData {
    params: Parameters,
    /// All arms, deleted ones included, keyed by name.
    arms: BTreeMap<String, ArmState>,
    max_reward: f64,
    choose_count: u64,
}

impl ExperimentData {
    fn new(params: Parameters, arm_names: &[String]) -> Self {
        let arms = arm_names
            .iter()
            .map(|name| (name.clone(), ArmState::default()))
            .collect();
        Self {
            params,
            arms,
            max_reward: DEFAULT_MAX_REWARD,
            choose_count: 0,
        }
    }
}

type Experiments = HashMap<String, Arc<ExperimentData>>;

pub struct MemoryBackend {
    experiments: ArcSwap<Experiments>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            experiments: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone-mutate-CAS on the whole experiment map. `mutate` receives the
    /// current experiment (`None` if absent) and returns its replacement
    /// (`None` to remove it) plus whatever value the caller wants back.
    fn update_experiment<T>(
        &self,
        experiment: &str,
        mutate: impl Fn(Option<&ExperimentData>) -> (Option<ExperimentData>, T),
    ) -> T {
        loop {
            let old = self.experiments.load_full();
            let current = old.get(experiment).map(|e| e.as_ref());
            let (replacement, result) = mutate(current);

            let mut new_map = (*old).clone();
            match replacement {
                Some(data) => {
                    new_map.insert(experiment.to_string(), Arc::new(data));
                }
                None => {
                    new_map.remove(experiment);
                }
            }

            let prev = self.experiments.compare_and_swap(&old, Arc::new(new_map));
            if Arc::ptr_eq(&prev, &old) {
                return result;
            }
            debug!(experiment, "memory backend CAS retry");
        }
    }

    fn read_experiment(&self, experiment: &str) -> Option<Arc<ExperimentData>> {
        self.experiments.load().get(experiment).cloned()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn exists_experiment(&self, experiment: &str) -> BanditResult<bool> {
        Ok(self.read_experiment(experiment).is_some())
    }

    async fn init_experiment(
        &self,
        experiment: &str,
        params: &Parameters,
        arm_names: &[String],
    ) -> BanditResult<()> {
        self.update_experiment(experiment, |existing| match existing {
            Some(data) => (Some(data.clone()), ()),
            None => (Some(ExperimentData::new(params.clone(), arm_names)), ()),
        });
        Ok(())
    }

    async fn get_params(&self, experiment: &str) -> BanditResult<Option<Parameters>> {
        Ok(self.read_experiment(experiment).map(|d| d.params.clone()))
    }

    async fn get_arm_states(&self, experiment: &str) -> BanditResult<BTreeMap<String, ArmState>> {
        Ok(self
            .read_experiment(experiment)
            .map(|d| {
                d.arms
                    .iter()
                    .filter(|(_, s)| !s.deleted)
                    .map(|(k, v)| (k.clone(), *v))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_arm_names(&self, experiment: &str) -> BanditResult<BTreeSet<String>> {
        Ok(self
            .read_experiment(experiment)
            .map(|d| {
                d.arms
                    .iter()
                    .filter(|(_, s)| !s.deleted)
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_arm(&self, experiment: &str, arm: &str) -> BanditResult<()> {
        self.update_experiment(experiment, |existing| match existing {
            Some(data) => {
                let mut data = data.clone();
                data.arms
                    .entry(arm.to_string())
                    .and_modify(|s| s.deleted = false)
                    .or_insert_with(ArmState::default);
                (Some(data), ())
            }
            None => (None, ()),
        });
        Ok(())
    }

    async fn soft_delete_arm(&self, experiment: &str, arm: &str) -> BanditResult<()> {
        self.update_experiment(experiment, |existing| match existing {
            Some(data) => {
                let mut data = data.clone();
                if let Some(state) = data.arms.get_mut(arm) {
                    state.deleted = true;
                }
                (Some(data), ())
            }
            None => (None, ()),
        });
        Ok(())
    }

    async fn hard_delete_arm(&self, experiment: &str, arm: &str) -> BanditResult<()> {
        self.update_experiment(experiment, |existing| match existing {
            Some(data) => {
                let mut data = data.clone();
                data.arms.remove(arm);
                (Some(data), ())
            }
            None => (None, ()),
        });
        Ok(())
    }

    async fn record_reward(
        &self,
        experiment: &str,
        arm: &str,
        lower_bound: f64,
        reward: f64,
    ) -> BanditResult<()> {
        self.update_experiment(experiment, |existing| match existing {
            Some(data) => {
                let mut data = data.clone();
                if let Some(state) = data.arms.get(arm).copied() {
                    let outcome =
                        reward_math::apply_single(state, data.max_reward, lower_bound, reward);
                    data.arms.insert(arm.to_string(), outcome.arm);
                    data.max_reward = outcome.max_reward;
                }
                (Some(data), ())
            }
            None => (None, ()),
        });
        Ok(())
    }

    async fn bulk_reward(
        &self,
        experiment: &str,
        arm: &str,
        lower_bound: f64,
        batch: BulkRewardInput,
    ) -> BanditResult<()> {
        self.update_experiment(experiment, |existing| match existing {
            Some(data) => {
                let mut data = data.clone();
                if let Some(state) = data.arms.get(arm).copied() {
                    let outcome =
                        reward_math::apply_bulk(state, data.max_reward, lower_bound, batch);
                    data.arms.insert(arm.to_string(), outcome.arm);
                    data.max_reward = outcome.max_reward;
                }
                (Some(data), ())
            }
            None => (None, ()),
        });
        Ok(())
    }

    async fn incr_choose_count(&self, experiment: &str) -> BanditResult<u64> {
        let new_count = self.update_experiment(experiment, |existing| match existing {
            Some(data) => {
                let mut data = data.clone();
                data.choose_count += 1;
                let n = data.choose_count;
                (Some(data), n)
            }
            None => (None, 0),
        });
        if self.read_experiment(experiment).is_none() {
            return Err(BanditError::Storage(format!(
                "experiment {experiment:?} does not exist"
            )));
        }
        Ok(new_count)
    }

    async fn get_choose_count(&self, experiment: &str) -> BanditResult<u64> {
        Ok(self.read_experiment(experiment).map(|d| d.choose_count).unwrap_or(0))
    }

    async fn reset(&self) -> BanditResult<()> {
        self.experiments.store(Arc::new(HashMap::new()));
        Ok(())
    }
}
