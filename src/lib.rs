//! banditbrain — a multi-armed bandit decision engine, embeddable as a
//! library component in a host service.
//!
//! Four selection policies (ε-greedy, UCB1, softmax, uniform random) sit
//! behind a single [`engine::BanditEngine`] façade, generic over a pluggable
//! [`storage::StorageBackend`] — in-process memory or a remote Redis-backed
//! store with server-side atomic scripts. Rewards may arrive singly or in
//! bulk, out of order, and arms may be added or removed at any time.

pub mod engine;
pub mod error;
pub mod key;
pub mod model;
pub mod policy;
pub mod probability;
pub mod reward_math;
pub mod rng;
pub mod storage;

pub use engine::{BanditEngine, BulkRewardRequest, InitRequest, RewardRequest};
pub use error::{BanditError, BanditResult};
pub use model::{Algorithm, ArmState, Parameters};
pub use rng::{EntropySource, SeededEntropy, ThreadEntropy};
pub use storage::memory::MemoryBackend;
pub use storage::remote::{RemoteBackend, RemoteConfig};
pub use storage::StorageBackend;
