//! Train CartPole with ES — the in-process reference run.
//!
//! Run with: cargo run --release --bin train_cartpole

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use evostrat::env::cartpole::{self, CartPole};
use evostrat::env::Environment;
use evostrat::rollout::EnvFactory;
use evostrat::{
    EsConfig, EsTrainer, FeedForwardPolicy, MemorySink, NoiseTable, PooledCollector,
    RewardThreshold, RolloutCollector, SequentialCollector, StatsSink, TracingSink,
};

#[derive(Parser)]
#[command(name = "train_cartpole", about = "ES training on CartPole")]
struct Cli {
    /// Noise table size
    #[arg(long, default_value = "1000000")]
    noise_table_size: usize,

    /// Master seed (noise table, init, offsets, episodes all derive from it)
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Training epochs
    #[arg(long, default_value = "100")]
    n_epochs: usize,

    /// Antithetic rollout pairs per update
    #[arg(long, default_value = "100")]
    n_rollouts: usize,

    /// Episodes per perturbation sign
    #[arg(long, default_value = "1")]
    eval_episodes: usize,

    /// Perturbation standard deviation
    #[arg(long, default_value = "0.02")]
    noise_stddev: f64,

    /// Adam step size
    #[arg(long, default_value = "0.01")]
    step_size: f64,

    /// L2 weight decay
    #[arg(long, default_value = "0.005")]
    l2_penalty: f64,

    /// Stop early once mean reward reaches this value
    #[arg(long, default_value = "475.0")]
    solved_threshold: f64,

    /// Evaluate rollouts one after another instead of on the rayon pool
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = EsConfig {
        n_rollouts_per_update: cli.n_rollouts,
        n_timesteps_per_update: 0,
        max_steps: 0,
        n_eval_episodes: cli.eval_episodes,
        noise_stddev: cli.noise_stddev,
        l2_penalty: cli.l2_penalty,
        n_epochs: cli.n_epochs,
        step_size: cli.step_size,
    };

    let policy = Arc::new(FeedForwardPolicy::new(
        cartpole::OBS_DIM,
        &[32, 16],
        cartpole::ACTION_SPACE,
    ));
    let noise = Arc::new(NoiseTable::new(cli.noise_table_size, cli.seed)?);
    let initial_params = policy.init_params(cli.seed.wrapping_add(1));

    tracing::info!(
        n_params = initial_params.len(),
        noise_table = noise.len(),
        rollouts = cli.n_rollouts,
        stddev = cli.noise_stddev,
        sequential = cli.sequential,
        "starting ES training on CartPole"
    );

    let env_factory: EnvFactory = Box::new(|| Box::new(CartPole::new()) as Box<dyn Environment>);
    let agent_seed = cli.seed.wrapping_add(2);
    let sampling_seed = cli.seed.wrapping_add(3);

    let mut collector: Box<dyn RolloutCollector> = if cli.sequential {
        Box::new(SequentialCollector::new(
            policy.clone(),
            noise.clone(),
            env_factory,
            &config,
            agent_seed,
            sampling_seed,
        ))
    } else {
        Box::new(PooledCollector::new(
            policy.clone(),
            noise.clone(),
            env_factory,
            &config,
            agent_seed,
            sampling_seed,
        ))
    };

    let mut trainer = EsTrainer::new(config, initial_params, noise)?;
    let mut selection = RewardThreshold {
        threshold: cli.solved_threshold,
    };

    // Log every epoch as it happens and keep a copy for the final summary.
    let mut tracing_sink = TracingSink;
    let mut memory = MemorySink::default();
    struct Tee<'a>(&'a mut TracingSink, &'a mut MemorySink);
    impl StatsSink for Tee<'_> {
        fn log(&mut self, stats: &evostrat::EpochStats) {
            self.0.log(stats);
            self.1.log(stats);
        }
    }
    let mut sink = Tee(&mut tracing_sink, &mut memory);

    trainer.train(&mut *collector, &mut sink, Some(&mut selection))?;

    if let Some(last) = memory.epochs.last() {
        let solved = last.reward_mean >= cli.solved_threshold;
        tracing::info!(
            epochs = memory.epochs.len(),
            reward_mean = format_args!("{:.1}", last.reward_mean),
            solved,
            "training finished"
        );
        println!("{}", serde_json::to_string_pretty(last)?);
    }
    Ok(())
}
