use banditbrain::model::{Algorithm, ArmState, Parameters};
use banditbrain::{MemoryBackend, StorageBackend};

fn params() -> Parameters {
    Parameters {
        algorithm: Algorithm::Random,
        maximize: true,
        reward_lower_bound: 0.0,
    }
}

#[tokio::test]
async fn init_is_idempotent() {
    let backend = MemoryBackend::new();
    let arms = vec!["a".to_string(), "b".to_string()];
    backend.init_experiment("exp", &params(), &arms).await.unwrap();
    backend.record_reward("exp", "a", 0.0, 1.0).await.unwrap();
    backend.init_experiment("exp", &params(), &arms).await.unwrap();

    let states = backend.get_arm_states("exp").await.unwrap();
    assert_eq!(states["a"].n, 2);
}

#[tokio::test]
async fn hard_delete_is_permanent() {
    let backend = MemoryBackend::new();
    let arms = vec!["a".to_string()];
    backend.init_experiment("exp", &params(), &arms).await.unwrap();
    backend.hard_delete_arm("exp", "a").await.unwrap();
    backend.record_reward("exp", "a", 0.0, 1.0).await.unwrap();

    let states = backend.get_arm_states("exp").await.unwrap();
    assert!(!states.contains_key("a"));

    backend.create_arm("exp", "a").await.unwrap();
    let states = backend.get_arm_states("exp").await.unwrap();
    assert_eq!(states["a"], ArmState::default());
}

#[tokio::test]
async fn soft_delete_then_create_restores_state() {
    let backend = MemoryBackend::new();
    let arms = vec!["a".to_string()];
    backend.init_experiment("exp", &params(), &arms).await.unwrap();
    backend.record_reward("exp", "a", 0.0, 0.7).await.unwrap();
    let before = backend.get_arm_states("exp").await.unwrap()["a"];

    backend.soft_delete_arm("exp", "a").await.unwrap();
    assert!(!backend.get_arm_states("exp").await.unwrap().contains_key("a"));

    backend.create_arm("exp", "a").await.unwrap();
    let after = backend.get_arm_states("exp").await.unwrap()["a"];
    assert_eq!(before, after);
}
