//! Hierarchical storage key formatting.
//!
//! Keys are built as `bandit:experiment:{name}:{suffix}`. The `:` separator
//! is reserved, so experiment and arm names may never contain it.

use crate::error::BanditError;

pub const SEPARATOR: char = ':';

/// Rejects a name containing the reserved separator.
pub fn validate_name(name: &str) -> Result<(), BanditError> {
    if name.is_empty() {
        return Err(BanditError::InvalidName(name.to_string()));
    }
    if name.contains(SEPARATOR) {
        return Err(BanditError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn experiment_prefix(experiment: &str) -> String {
    format!("bandit:experiment:{experiment}")
}

pub fn params_key(experiment: &str) -> String {
    format!("{}:params", experiment_prefix(experiment))
}

pub fn arm_names_key(experiment: &str) -> String {
    format!("{}:arm-names", experiment_prefix(experiment))
}

pub fn arm_state_key(experiment: &str, arm: &str) -> String {
    format!("{}:arm-states:{arm}", experiment_prefix(experiment))
}

pub fn max_reward_key(experiment: &str) -> String {
    format!("{}:max-reward", experiment_prefix(experiment))
}

pub fn choose_count_key(experiment: &str) -> String {
    format!("{}:choose-count", experiment_prefix(experiment))
}

/// Pattern matching every key this backend owns, for a full `reset`.
pub fn global_pattern() -> &'static str {
    "bandit:experiment:*"
}

