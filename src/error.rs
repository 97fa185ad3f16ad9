//! Error taxonomy for the engine's public boundary.
//!
//! Only schema-violation and storage-I/O failures become `Err`. Missing-target
//! cases (reward for an absent arm, `choose` with no live arms) are resolved
//! internally as silent no-ops or `None` — see the engine façade.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BanditError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid name {0:?}: names must not contain ':'")]
    InvalidName(String),

    #[error("invalid reward: {0}")]
    InvalidReward(String),

    #[error("storage backend error: {0}")]
    Storage(String),
}

pub type BanditResult<T> = Result<T, BanditError>;
