//! Data model: arms, parameters, and the per-algorithm configuration.

use serde::{Deserialize, Serialize};

use crate::error::BanditError;

/// Selection policy and its algorithm-specific knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algo", rename_all = "snake_case")]
pub enum Algorithm {
    EpsilonGreedy { epsilon: f64 },
    Ucb1 { #[serde(default = "default_exploration_mult")] exploration_mult: f64 },
    Softmax {
        starting_temperature: f64,
        temp_decay_per_step: f64,
        min_temperature: f64,
    },
    Random,
}

fn default_exploration_mult() -> f64 {
    1.0
}

impl Algorithm {
    pub fn validate(&self) -> Result<(), BanditError> {
        match self {
            Algorithm::EpsilonGreedy { epsilon } => {
                if !(*epsilon > 0.0 && *epsilon < 1.0) {
                    return Err(BanditError::InvalidParameters(format!(
                        "epsilon must be in (0, 1), got {epsilon}"
                    )));
                }
            }
            Algorithm::Ucb1 { exploration_mult } => {
                if !(*exploration_mult > 0.0) {
                    return Err(BanditError::InvalidParameters(format!(
                        "explorationMult must be positive, got {exploration_mult}"
                    )));
                }
            }
            Algorithm::Softmax {
                starting_temperature,
                temp_decay_per_step,
                min_temperature,
            } => {
                for (name, v) in [
                    ("startingTemperature", starting_temperature),
                    ("tempDecayPerStep", temp_decay_per_step),
                    ("minTemperature", min_temperature),
                ] {
                    if !(*v > 0.0) {
                        return Err(BanditError::InvalidParameters(format!(
                            "{name} must be positive, got {v}"
                        )));
                    }
                }
            }
            Algorithm::Random => {}
        }
        Ok(())
    }
}

/// Immutable-after-`init` parameter record for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub algorithm: Algorithm,
    pub maximize: bool,
    #[serde(default)]
    pub reward_lower_bound: f64,
}

impl Parameters {
    pub fn validate(&self) -> Result<(), BanditError> {
        if !self.reward_lower_bound.is_finite() {
            return Err(BanditError::InvalidParameters(
                "rewardLowerBound must be finite".into(),
            ));
        }
        self.algorithm.validate()
    }
}

/// Per-arm, per-experiment state. Once pulled, `n >= 1` and `mean_reward`
/// stays in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    pub n: u64,
    pub mean_reward: f64,
    pub deleted: bool,
}

impl Default for ArmState {
    fn default() -> Self {
        Self {
            n: 1,
            mean_reward: 0.0,
            deleted: false,
        }
    }
}

impl ArmState {
    pub fn is_unrewarded(&self) -> bool {
        self.n == 1
    }
}

/// Default running maximum before any reward has been recorded.
pub const DEFAULT_MAX_REWARD: f64 = 1.0;
