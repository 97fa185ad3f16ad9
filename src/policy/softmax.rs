//! Softmax.
//!
//! Minimization flips the sign of the exponent rather than remapping
//! probabilities after the fact: `exp(-mean(a) / T)` instead of
//! `exp(mean(a) / T)`, normalized the same way either direction. A
//! `2/k - p(a)` post-hoc remap isn't guaranteed to stay non-negative or
//! sum to 1 once `k > 2`; the sign flip is a proper distribution by
//! construction.

use std::collections::BTreeMap;

use super::{AlgorithmPolicy, RewardHook};
use crate::model::{Algorithm, ArmState, Parameters};
use crate::probability::weighted_sample;
use crate::rng::EntropySource;

pub struct Softmax;

struct Temperature {
    starting: f64,
    decay_per_step: f64,
    min: f64,
}

fn temperature_params(params: &Parameters) -> Temperature {
    match params.algorithm {
        Algorithm::Softmax {
            starting_temperature,
            temp_decay_per_step,
            min_temperature,
        } => Temperature {
            starting: starting_temperature,
            decay_per_step: temp_decay_per_step,
            min: min_temperature,
        },
        _ => unreachable!("Softmax policy requires Algorithm::Softmax params"),
    }
}

fn current_temperature(t: &Temperature, total_n: u64) -> f64 {
    (t.starting - t.decay_per_step * total_n as f64).max(t.min)
}

fn weights(live: &BTreeMap<String, ArmState>, params: &Parameters, temp: f64) -> BTreeMap<String, f64> {
    live.iter()
        .map(|(name, s)| {
            let exponent = if params.maximize {
                s.mean_reward / temp
            } else {
                -s.mean_reward / temp
            };
            (name.clone(), exponent.exp())
        })
        .collect()
}

impl AlgorithmPolicy for Softmax {
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
        let t = temperature_params(params);
        let total_n: u64 = live.values().map(|s| s.n).sum();
        let temp = current_temperature(&t, total_n);
        let w = weights(live, params, temp);
        weighted_sample(&w, rng)
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
        if live.is_empty() {
            return BTreeMap::new();
        }
        let t = temperature_params(params);
        let total_n: u64 = live.values().map(|s| s.n).sum();
        let temp = current_temperature(&t, total_n);
        let w = weights(live, params, temp);
        let total: f64 = w.values().sum();
        w.into_iter().map(|(name, v)| (name, v / total)).collect()
    }
}
