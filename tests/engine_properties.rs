//! Idempotence, distribution validity, delete/restore, and choose-count
//! invariants (P3, P4, P6, P7, P8, P9) exercised through the engine façade
//! over a `MemoryBackend`, for randomized algorithm configs and arm sets.

use std::collections::BTreeSet;
use std::sync::Arc;

use banditbrain::{
    Algorithm, BanditEngine, InitRequest, MemoryBackend, RewardRequest, SeededEntropy,
    StorageBackend,
};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

fn arm_name_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn distinct_arm_names(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(arm_name_strategy(), min..max).prop_map(|s| s.into_iter().collect())
}

fn algorithm_strategy() -> impl Strategy<Value = Algorithm> {
    prop_oneof![
        (0.01f64..1.0).prop_map(|epsilon| Algorithm::EpsilonGreedy { epsilon }),
        (0.1f64..5.0).prop_map(|exploration_mult| Algorithm::Ucb1 { exploration_mult }),
        (0.1f64..5.0, 0.0f64..1.0, 0.01f64..1.0).prop_map(
            |(starting_temperature, temp_decay_per_step, min_temperature)| Algorithm::Softmax {
                starting_temperature,
                temp_decay_per_step,
                min_temperature,
            }
        ),
        Just(Algorithm::Random),
    ]
}

fn reward_strategy() -> impl Strategy<Value = f64> {
    -5.0f64..5.0
}

async fn run_idempotence_case(
    algorithm: Algorithm,
    arm_names: Vec<String>,
    rewards: Vec<(usize, f64)>,
) -> Result<(), TestCaseError> {
    let engine = BanditEngine::new(MemoryBackend::new());
    let init = InitRequest {
        experiment_name: "p3".into(),
        algorithm,
        arm_names: arm_names.clone(),
        maximize: true,
        reward_lower_bound: 0.0,
    };
    engine.init(init.clone()).await.unwrap();
    for (idx, reward_value) in rewards {
        let arm_name = arm_names[idx % arm_names.len()].clone();
        engine
            .reward("p3", RewardRequest { arm_name, reward_value })
            .await
            .unwrap();
    }
    let before = engine.get_arm_states("p3").await.unwrap();
    engine.init(init).await.unwrap();
    let after = engine.get_arm_states("p3").await.unwrap();
    prop_assert_eq!(before, after);
    Ok(())
}

async fn run_distribution_sums_to_one_case(
    algorithm: Algorithm,
    arm_names: Vec<String>,
    rewards: Vec<(usize, f64)>,
) -> Result<(), TestCaseError> {
    let engine = BanditEngine::new(MemoryBackend::new());
    engine
        .init(InitRequest {
            experiment_name: "p4".into(),
            algorithm,
            arm_names: arm_names.clone(),
            maximize: true,
            reward_lower_bound: 0.0,
        })
        .await
        .unwrap();
    for (idx, reward_value) in rewards {
        let arm_name = arm_names[idx % arm_names.len()].clone();
        engine
            .reward("p4", RewardRequest { arm_name, reward_value })
            .await
            .unwrap();
    }
    let dist = engine.arm_selection_probabilities("p4").await.unwrap();
    let sum: f64 = dist.values().sum();
    prop_assert!((sum - 1.0).abs() < 1e-9, "sum={}", sum);
    Ok(())
}

async fn run_undelete_restores_case(
    algorithm: Algorithm,
    arm_names: Vec<String>,
    rewards: Vec<(usize, f64)>,
) -> Result<(), TestCaseError> {
    let engine = BanditEngine::new(MemoryBackend::new());
    engine
        .init(InitRequest {
            experiment_name: "p6".into(),
            algorithm,
            arm_names: arm_names.clone(),
            maximize: true,
            reward_lower_bound: 0.0,
        })
        .await
        .unwrap();
    let target = arm_names[0].clone();
    for (idx, reward_value) in rewards {
        let arm_name = arm_names[idx % arm_names.len()].clone();
        engine
            .reward("p6", RewardRequest { arm_name, reward_value })
            .await
            .unwrap();
    }
    let before = engine.get_arm_states("p6").await.unwrap()[&target];

    engine.soft_delete_arm("p6", &target).await.unwrap();
    engine.create_arm("p6", &target).await.unwrap();
    let after = engine.get_arm_states("p6").await.unwrap()[&target];

    prop_assert_eq!(before, after);
    Ok(())
}

async fn run_hard_delete_permanent_case(
    algorithm: Algorithm,
    arm_names: Vec<String>,
    rewards: Vec<(usize, f64)>,
) -> Result<(), TestCaseError> {
    let engine = BanditEngine::new(MemoryBackend::new());
    engine
        .init(InitRequest {
            experiment_name: "p7".into(),
            algorithm,
            arm_names: arm_names.clone(),
            maximize: true,
            reward_lower_bound: 0.0,
        })
        .await
        .unwrap();
    let target = arm_names[0].clone();
    for (idx, reward_value) in rewards {
        let arm_name = arm_names[idx % arm_names.len()].clone();
        engine
            .reward("p7", RewardRequest { arm_name, reward_value })
            .await
            .unwrap();
    }

    engine.hard_delete_arm("p7", &target).await.unwrap();
    // Ignored: the arm no longer exists.
    engine
        .reward("p7", RewardRequest { arm_name: target.clone(), reward_value: 1.0 })
        .await
        .unwrap();
    prop_assert!(!engine.get_arm_states("p7").await.unwrap().contains_key(&target));

    engine.create_arm("p7", &target).await.unwrap();
    let recreated = engine.get_arm_states("p7").await.unwrap()[&target];
    prop_assert_eq!(recreated, banditbrain::ArmState::default());
    Ok(())
}

async fn run_choose_never_returns_deleted_case(
    algorithm: Algorithm,
    arm_names: Vec<String>,
    deleted_idxs: BTreeSet<usize>,
    seed: u64,
) -> Result<(), TestCaseError> {
    let engine = BanditEngine::new(MemoryBackend::new());
    engine
        .init(InitRequest {
            experiment_name: "p8".into(),
            algorithm,
            arm_names: arm_names.clone(),
            maximize: true,
            reward_lower_bound: 0.0,
        })
        .await
        .unwrap();

    let mut deleted = BTreeSet::new();
    for &idx in &deleted_idxs {
        // Keep at least one live arm so `choose` always has a candidate.
        if deleted.len() + 1 >= arm_names.len() {
            break;
        }
        let name = &arm_names[idx % arm_names.len()];
        if deleted.insert(name.clone()) {
            if idx % 2 == 0 {
                engine.soft_delete_arm("p8", name).await.unwrap();
            } else {
                engine.hard_delete_arm("p8", name).await.unwrap();
            }
        }
    }

    let mut rng = SeededEntropy::new(seed);
    for _ in 0..50 {
        if let Some(pick) = engine.choose("p8", &mut rng).await.unwrap() {
            prop_assert!(!deleted.contains(&pick), "choose returned deleted arm {}", pick);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn init_is_idempotent_after_arbitrary_rewards(
        algorithm in algorithm_strategy(),
        arm_names in distinct_arm_names(1, 6),
        rewards in prop::collection::vec((0usize..10, reward_strategy()), 0..30),
    ) {
        block_on(run_idempotence_case(algorithm, arm_names, rewards))?;
    }

    #[test]
    fn distribution_sums_to_one_for_every_policy(
        algorithm in algorithm_strategy(),
        arm_names in distinct_arm_names(2, 6),
        rewards in prop::collection::vec((0usize..10, reward_strategy()), 0..30),
    ) {
        block_on(run_distribution_sums_to_one_case(algorithm, arm_names, rewards))?;
    }

    #[test]
    fn undelete_restores_pre_delete_state(
        algorithm in algorithm_strategy(),
        arm_names in distinct_arm_names(1, 6),
        rewards in prop::collection::vec((0usize..10, reward_strategy()), 0..30),
    ) {
        block_on(run_undelete_restores_case(algorithm, arm_names, rewards))?;
    }

    #[test]
    fn hard_delete_is_permanent_and_recreate_is_fresh(
        algorithm in algorithm_strategy(),
        arm_names in distinct_arm_names(1, 6),
        rewards in prop::collection::vec((0usize..10, reward_strategy()), 0..30),
    ) {
        block_on(run_hard_delete_permanent_case(algorithm, arm_names, rewards))?;
    }

    #[test]
    fn choose_never_returns_a_deleted_arm(
        algorithm in algorithm_strategy(),
        arm_names in distinct_arm_names(2, 6),
        deleted_idxs in prop::collection::btree_set(0usize..6, 0..4),
        seed in any::<u64>(),
    ) {
        block_on(run_choose_never_returns_deleted_case(algorithm, arm_names, deleted_idxs, seed))?;
    }
}

/// P9: concurrent `choose` callers against one `MemoryBackend` experiment
/// observe a `chooseCount` that only ever increases. `incr_choose_count`'s
/// CAS-retry loop (storage/memory.rs) must hand out a distinct value to
/// every caller with none lost or duplicated, which is exactly what this
/// drives: every concurrent increment lands, and the returned values form
/// the permutation `1..=total` with no gaps.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn choose_count_is_monotone_under_concurrent_callers() {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .init_experiment(
            "p9",
            &banditbrain::Parameters {
                algorithm: Algorithm::Random,
                maximize: true,
                reward_lower_bound: 0.0,
            },
            &["a".to_string(), "b".to_string()],
        )
        .await
        .unwrap();

    let tasks_n = 16;
    let increments_per_task = 50;
    let mut handles = Vec::new();
    for _ in 0..tasks_n {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            let mut observed = Vec::with_capacity(increments_per_task);
            for _ in 0..increments_per_task {
                observed.push(backend.incr_choose_count("p9").await.unwrap());
            }
            observed
        }));
    }

    let mut all_counts = Vec::new();
    for handle in handles {
        all_counts.extend(handle.await.unwrap());
    }

    all_counts.sort_unstable();
    let total = tasks_n * increments_per_task;
    let expected: Vec<u64> = (1..=total as u64).collect();
    assert_eq!(all_counts, expected, "choose-count increments lost or duplicated under concurrency");

    let final_count = backend.get_choose_count("p9").await.unwrap();
    assert_eq!(final_count, total as u64);
}
