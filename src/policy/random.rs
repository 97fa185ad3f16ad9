//! Uniform random. No state accumulation: `reward_hook` is a no-op.

use std::collections::BTreeMap;

use super::{AlgorithmPolicy, RewardHook};
use crate::model::{ArmState, Parameters};
use crate::rng::EntropySource;

pub struct Random;

impl AlgorithmPolicy for Random {
    fn choose(
        &self,
        live: &BTreeMap<String, ArmState>,
        _params: &Parameters,
        _choose_count: u64,
        rng: &mut dyn EntropySource,
    ) -> Option<String> {
        if live.is_empty() {
            return None;
        }
        let names: Vec<&String> = live.keys().collect();
        let idx = rng.next_index(names.len());
        Some(names[idx].clone())
    }

    fn reward_hook(&self) -> RewardHook {
        RewardHook::Noop
    }

    fn selection_probabilities(
        &self,
        live: &BTreeMap<String, ArmState>,
        _params: &Parameters,
        _choose_count: u64,
    ) -> BTreeMap<String, f64> {
        let mut dist = BTreeMap::new();
        if live.is_empty() {
            return dist;
        }
        let p = 1.0 / live.len() as f64;
        for name in live.keys() {
            dist.insert(name.clone(), p);
        }
        dist
    }
}
