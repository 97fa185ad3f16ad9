use std::collections::BTreeMap;

use banditbrain::probability::{normalize_to_distribution, weighted_sample};
use banditbrain::SeededEntropy;

#[test]
fn empty_weights_yield_none() {
    let weights = BTreeMap::new();
    let mut rng = SeededEntropy::new(1);
    assert_eq!(weighted_sample(&weights, &mut rng), None);
}

#[test]
fn single_positive_weight_always_wins() {
    let mut weights = BTreeMap::new();
    weights.insert("a".to_string(), 1.0);
    weights.insert("b".to_string(), 0.0);
    let mut rng = SeededEntropy::new(1);
    for _ in 0..20 {
        assert_eq!(weighted_sample(&weights, &mut rng).as_deref(), Some("a"));
    }
}

#[test]
fn normalize_sums_to_one() {
    let mut scores = BTreeMap::new();
    scores.insert("a".to_string(), 3.0);
    scores.insert("b".to_string(), 1.0);
    let dist = normalize_to_distribution(&scores);
    let sum: f64 = dist.values().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}
