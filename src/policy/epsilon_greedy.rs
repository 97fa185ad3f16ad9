//! ε-greedy.

use std::collections::BTreeMap;

use super::{arg_optimum, AlgorithmPolicy, RewardHook};
use crate::model::{Algorithm, ArmState, Parameters};
use crate::rng::EntropySource;

pub struct EpsilonGreedy;

fn epsilon(params: &Parameters) -> f64 {
    match params.algorithm {
        Algorithm::EpsilonGreedy { epsilon } => epsilon,
        _ => unreachable!("EpsilonGreedy policy requires Algorithm::EpsilonGreedy params"),
    }
}

impl AlgorithmPolicy for EpsilonGreedy {
    fn choose(
        &self,
        live: &BTreeMap<String, ArmState>,
        params: &Parameters,
        _choose_count: u64,
        rng: &mut dyn EntropySource,
    ) -> Option<String> {
        if live.is_empty() {
            return None;
        }
        let eps = epsilon(params);
        if rng.next_f64() < eps {
            let names: Vec<&String> = live.keys().collect();
            let idx = rng.next_index(names.len());
            Some(names[idx].clone())
        } else {
            arg_optimum(live, params.maximize, |_, s| s.mean_reward).map(str::to_string)
        }
    }

    fn reward_hook(&self) -> RewardHook {
        RewardHook::ScaleAndUpdate
    }

    fn selection_probabilities(
        &self,
        live: &BTreeMap<String, ArmState>,
        params: &Parameters,
        _choose_count: u64,
    ) -> BTreeMap<String, f64> {
        let mut dist = BTreeMap::new();
        if live.is_empty() {
            return dist;
        }
        let k = live.len() as f64;
        let eps = epsilon(params);
        let best = arg_optimum(live, params.maximize, |_, s| s.mean_reward);

        for name in live.keys() {
            let p = if Some(name.as_str()) == best {
                1.0 - eps + eps / k
            } else {
                eps / k
            };
            dist.insert(name.clone(), p);
        }
        dist
    }
}
