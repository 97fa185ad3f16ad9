//! UCB1, including the cold-start round-robin rule and the
//! deterministic sort-by-name tie-break (carried by `BTreeMap` iteration
//! order throughout this module).

use std::collections::BTreeMap;

use super::{arg_optimum, AlgorithmPolicy, RewardHook};
use crate::model::{Algorithm, ArmState, Parameters};
use crate::rng::EntropySource;

pub struct Ucb1;

fn exploration_mult(params: &Parameters) -> f64 {
    match params.algorithm {
        Algorithm::Ucb1 { exploration_mult } => exploration_mult,
        _ => unreachable!("Ucb1 policy requires Algorithm::Ucb1 params"),
    }
}

/// Cold-start classification: which, if any, round-robin branch applies.
enum Phase {
    /// Every live arm is unrewarded — round-robin over all of them.
    AllCold { unrewarded: Vec<String> },
    /// Some arms are unrewarded and it's their turn in the round-robin.
    PartialCold { unrewarded: Vec<String> },
    /// No cold-start branch applies — use the UCB formula.
    Warm,
}

fn classify(live: &BTreeMap<String, ArmState>, choose_count: u64) -> Phase {
    let k = live.len() as u64;
    if k == 0 {
        return Phase::Warm;
    }
    let unrewarded: Vec<String> = live
        .iter()
        .filter(|(_, s)| s.is_unrewarded())
        .map(|(name, _)| name.clone())
        .collect();
    let u = unrewarded.len() as u64;

    if u == k {
        Phase::AllCold { unrewarded }
    } else if u > 0 && (choose_count % k) < u {
        Phase::PartialCold { unrewarded }
    } else {
        Phase::Warm
    }
}

fn round_robin_pick(unrewarded: &[String], choose_count: u64, k: usize) -> String {
    let idx = (choose_count % k as u64) as usize;
    unrewarded[idx].clone()
}

fn ucb_score(mean: f64, n: u64, total_n: u64, exploration_mult: f64, maximize: bool) -> f64 {
    let bonus = exploration_mult * (2.0 * (total_n as f64).ln() / n as f64).sqrt();
    if maximize {
        mean + bonus
    } else {
        mean - bonus
    }
}

impl AlgorithmPolicy for Ucb1 {
    fn choose(
        &self,
        live: &BTreeMap<String, ArmState>,
        params: &Parameters,
        choose_count: u64,
        _rng: &mut dyn EntropySource,
    ) -> Option<String> {
        if live.is_empty() {
            return None;
        }
        let k = live.len();
        match classify(live, choose_count) {
            Phase::AllCold { unrewarded } | Phase::PartialCold { unrewarded } => {
                Some(round_robin_pick(&unrewarded, choose_count, k))
            }
            Phase::Warm => {
                let total_n: u64 = live.values().map(|s| s.n).sum();
                let mult = exploration_mult(params);
                arg_optimum(live, params.maximize, |_, s| {
                    ucb_score(s.mean_reward, s.n, total_n, mult, params.maximize)
                })
                .map(str::to_string)
            }
        }
    }

    fn reward_hook(&self) -> RewardHook {
        RewardHook::ScaleAndUpdate
    }

    fn selection_probabilities(
        &self,
        live: &BTreeMap<String, ArmState>,
        params: &Parameters,
        choose_count: u64,
    ) -> BTreeMap<String, f64> {
        let mut dist = BTreeMap::new();
        if live.is_empty() {
            return dist;
        }
        let k = live.len() as f64;

        match classify(live, choose_count) {
            Phase::AllCold { .. } | Phase::PartialCold { .. } => {
                for name in live.keys() {
                    dist.insert(name.clone(), 1.0 / k);
                }
            }
            Phase::Warm => {
                let total_n: u64 = live.values().map(|s| s.n).sum();
                let mult = exploration_mult(params);
                let best = arg_optimum(live, params.maximize, |_, s| {
                    ucb_score(s.mean_reward, s.n, total_n, mult, params.maximize)
                });
                for name in live.keys() {
                    let p = if Some(name.as_str()) == best { 1.0 } else { 0.0 };
                    dist.insert(name.clone(), p);
                }
            }
        }
        dist
    }
}
