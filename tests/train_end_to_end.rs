//! End-to-end training scenarios against toy environments.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use evostrat::env::cartpole::{self, CartPole};
use evostrat::env::{Action, ActionSpace, Environment, StepResult};
use evostrat::rollout::EnvFactory;
use evostrat::{
    Adam, EsConfig, EsTrainer, Error, FeedForwardPolicy, MemorySink, NoiseTable, PooledCollector,
    Result, SequentialCollector,
};

/// Returns a fixed reward of 1.0 every step regardless of action; never
/// terminates on its own (rollouts rely on the step cap).
struct ConstantRewardEnv;

impl Environment for ConstantRewardEnv {
    fn reset(&mut self, _seed: u64) -> Result<Vec<f32>> {
        Ok(vec![0.0; 4])
    }

    fn step(&mut self, _action: &Action) -> Result<StepResult> {
        Ok(StepResult {
            observation: vec![0.0; 4],
            reward: 1.0,
            terminated: false,
            truncated: false,
        })
    }
}

fn constant_factory() -> EnvFactory {
    Box::new(|| Box::new(ConstantRewardEnv) as Box<dyn Environment>)
}

#[test]
fn tied_rewards_reduce_to_pure_l2_decay() {
    // All shaped rewards tie, so the only remaining force on the parameters
    // is the weight-decay term: delta == adam.step(-l2 * params).
    let config = EsConfig {
        n_rollouts_per_update: 4,
        n_timesteps_per_update: 0,
        max_steps: 10,
        n_eval_episodes: 1,
        noise_stddev: 0.02,
        l2_penalty: 0.005,
        n_epochs: 1,
        step_size: 0.01,
    };

    let policy = Arc::new(FeedForwardPolicy::new(4, &[8], ActionSpace::Discrete(2)));
    let noise = Arc::new(NoiseTable::new(1_000_000, 42).unwrap());
    let initial = policy.init_params(7);

    let mut collector = SequentialCollector::new(
        policy.clone(),
        noise.clone(),
        constant_factory(),
        &config,
        11,
        12,
    );

    let mut trainer = EsTrainer::new(config.clone(), initial.clone(), noise).unwrap();
    let stats = trainer.train_epoch(&mut collector).unwrap();

    assert_eq!(stats.n_rollouts, 4);
    // 4 pairs × 2 signs × 10 capped steps.
    assert_eq!(stats.n_timesteps, 80);
    assert_eq!(stats.reward_std, 0.0);

    let expected_gradient: Vec<f64> = initial
        .iter()
        .map(|&p| -config.l2_penalty * p as f64)
        .collect();
    let expected_delta = Adam::new(config.step_size).step(&expected_gradient);

    for ((&after, &before), d) in trainer.params().iter().zip(&initial).zip(&expected_delta) {
        let expected = before + *d as f32;
        assert!(
            (after - expected).abs() < 1e-7,
            "after={after} expected={expected}"
        );
    }
}

#[test]
fn failed_first_rollout_is_resampled() {
    struct FailOnFirstStep;
    impl Environment for FailOnFirstStep {
        fn reset(&mut self, _seed: u64) -> Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }
        fn step(&mut self, _action: &Action) -> Result<StepResult> {
            Err(Error::rollout("simulator crashed"))
        }
    }

    let config = EsConfig {
        n_rollouts_per_update: 4,
        max_steps: 10,
        n_epochs: 1,
        ..EsConfig::default()
    };

    let policy = Arc::new(FeedForwardPolicy::new(4, &[8], ActionSpace::Discrete(2)));
    let noise = Arc::new(NoiseTable::new(100_000, 1).unwrap());
    let initial = policy.init_params(7);

    // The environment for the very first dispatched offset fails.
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = constructed.clone();
    let factory: EnvFactory = Box::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Box::new(FailOnFirstStep) as Box<dyn Environment>
        } else {
            Box::new(ConstantRewardEnv) as Box<dyn Environment>
        }
    });

    let mut collector = SequentialCollector::new(policy, noise.clone(), factory, &config, 5, 6);
    let mut trainer = EsTrainer::new(config, initial, noise).unwrap();
    let stats = trainer.train_epoch(&mut collector).unwrap();
    assert_eq!(stats.n_rollouts, 4, "batch must still reach the full budget");
}

#[test]
fn zero_budgets_fail_at_construction() {
    let config = EsConfig {
        n_rollouts_per_update: 0,
        n_timesteps_per_update: 0,
        ..EsConfig::default()
    };
    let noise = Arc::new(NoiseTable::new(10_000, 1).unwrap());
    // Never reaches an epoch: construction itself rejects the config.
    match EsTrainer::new(config, vec![0.1; 16], noise) {
        Err(Error::Configuration(_)) => {}
        other => panic!("expected Configuration error, got {other:?}"),
    }
}

#[test]
fn sequential_and_pooled_collectors_agree() {
    // Same seeds, same contract: the trainer cannot tell the dummy mode and
    // the pooled mode apart.
    let config = EsConfig {
        n_rollouts_per_update: 8,
        max_steps: 50,
        n_epochs: 2,
        ..EsConfig::default()
    };
    let policy = Arc::new(FeedForwardPolicy::new(
        cartpole::OBS_DIM,
        &[8],
        cartpole::ACTION_SPACE,
    ));
    let noise = Arc::new(NoiseTable::new(200_000, 9).unwrap());
    let initial = policy.init_params(3);
    let cartpole_factory =
        || Box::new(|| Box::new(CartPole::new()) as Box<dyn Environment>) as EnvFactory;

    let mut seq = SequentialCollector::new(
        policy.clone(),
        noise.clone(),
        cartpole_factory(),
        &config,
        21,
        22,
    );
    let mut pooled = PooledCollector::new(
        policy.clone(),
        noise.clone(),
        cartpole_factory(),
        &config,
        21,
        22,
    );

    let mut a = EsTrainer::new(config.clone(), initial.clone(), noise.clone()).unwrap();
    let mut b = EsTrainer::new(config, initial, noise).unwrap();
    let mut sink_a = MemorySink::default();
    let mut sink_b = MemorySink::default();
    a.train(&mut seq, &mut sink_a, None).unwrap();
    b.train(&mut pooled, &mut sink_b, None).unwrap();

    assert_eq!(a.params(), b.params());
    assert_eq!(sink_a.epochs.len(), sink_b.epochs.len());
    for (sa, sb) in sink_a.epochs.iter().zip(&sink_b.epochs) {
        assert_eq!(sa.reward_mean, sb.reward_mean);
        assert_eq!(sa.n_timesteps, sb.n_timesteps);
    }
}

#[test]
fn cartpole_training_makes_progress_and_stays_finite() {
    let config = EsConfig {
        n_rollouts_per_update: 20,
        max_steps: 100,
        n_epochs: 3,
        noise_stddev: 0.05,
        step_size: 0.02,
        ..EsConfig::default()
    };
    let policy = Arc::new(FeedForwardPolicy::new(
        cartpole::OBS_DIM,
        &[16],
        cartpole::ACTION_SPACE,
    ));
    let noise = Arc::new(NoiseTable::new(500_000, 17).unwrap());
    let initial = policy.init_params(17);
    let factory: EnvFactory = Box::new(|| Box::new(CartPole::new()) as Box<dyn Environment>);

    let mut collector = PooledCollector::new(policy, noise.clone(), factory, &config, 30, 31);
    let mut trainer = EsTrainer::new(config, initial.clone(), noise).unwrap();
    let mut sink = MemorySink::default();
    trainer.train(&mut collector, &mut sink, None).unwrap();

    assert_eq!(sink.epochs.len(), 3);
    assert!(trainer.params().iter().all(|p| p.is_finite()));
    assert_ne!(trainer.params(), &initial[..], "parameters must move");
    for s in &sink.epochs {
        assert!(s.n_rollouts >= 20);
        assert!(s.reward_mean > 0.0);
        assert!(s.update_norm > 0.0);
    }
}
