//! Weighted sampling from a discrete distribution, and the probability
//! inversion used to turn a maximization distribution into a minimization one.

use std::collections::BTreeMap;

use crate::rng::EntropySource;

/// Samples a key from `weights` via cumulative distribution + a uniform draw
/// in `[0, 1)`. `weights` need not sum to 1 — they are normalized internally.
/// Returns `None` if `weights` is empty or every weight is non-positive.
pub fn weighted_sample(
    weights: &BTreeMap<String, f64>,
    rng: &mut dyn EntropySource,
) -> Option<String> {
    let total: f64 = weights.values().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }

    let draw = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (key, weight) in weights.iter() {
        if *weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        if draw < cumulative {
            return Some(key.clone());
        }
    }
    // Floating-point slack: fall back to the last positive-weight key.
    weights
        .iter()
        .rev()
        .find(|(_, w)| **w > 0.0)
        .map(|(k, _)| k.clone())
}

/// Normalizes a map of non-negative scores into a probability distribution
/// summing to 1.0. Returns an empty map if `scores` is empty.
pub fn normalize_to_distribution(scores: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let total: f64 = scores.values().sum();
    if total <= 0.0 {
        let k = scores.len();
        if k == 0 {
            return BTreeMap::new();
        }
        return scores.keys().map(|name| (name.clone(), 1.0 / k as f64)).collect();
    }
    scores
        .iter()
        .map(|(name, v)| (name.clone(), v / total))
        .collect()
}
