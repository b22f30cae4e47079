//! Rollout batch collection — sequential ("dummy") or pooled.
//!
//! Both collectors satisfy the same contract; the trainer never branches on
//! which one it drives. Workers share only the read-only noise table and the
//! read-only parameter snapshot, so the pooled mode needs no locking.

use std::collections::HashSet;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::warn;

use crate::config::EsConfig;
use crate::error::{Error, Result};
use crate::noise::NoiseTable;
use crate::policy::Policy;
use crate::rollout::{
    evaluate_pair, EnvFactory, ObservationNormalizer, RolloutConfig, RolloutResult,
};

/// Budget for one epoch's batch. Zero disables a criterion; every nonzero
/// criterion is a minimum and all configured minimums must be reached.
#[derive(Debug, Clone, Copy)]
pub struct SamplingBudget {
    pub n_rollouts: usize,
    pub n_timesteps: usize,
}

impl SamplingBudget {
    pub fn from_config(cfg: &EsConfig) -> Self {
        SamplingBudget {
            n_rollouts: cfg.n_rollouts_per_update,
            n_timesteps: cfg.n_timesteps_per_update,
        }
    }

    pub fn is_met(&self, n_rollouts: usize, n_timesteps: u64) -> bool {
        (self.n_rollouts == 0 || n_rollouts >= self.n_rollouts)
            && (self.n_timesteps == 0 || n_timesteps >= self.n_timesteps as u64)
    }
}

/// One epoch's worth of rollout results. Order is irrelevant — the ES update
/// is a sum over independent samples.
#[derive(Debug, Default)]
pub struct EpochBatch {
    results: Vec<RolloutResult>,
}

impl EpochBatch {
    pub fn push(&mut self, result: RolloutResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[RolloutResult] {
        &self.results
    }

    pub fn n_samples(&self) -> usize {
        self.results.len()
    }

    pub fn total_timesteps(&self) -> u64 {
        self.results.iter().map(|r| r.total_steps()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Source of epoch batches. The trainer blocks on `collect` until the budget
/// condition is satisfied — no work is outstanding when it returns.
pub trait RolloutCollector {
    fn collect(&mut self, base_params: &[f32]) -> Result<EpochBatch>;
}

/// Shared worker-side state: everything an evaluation reads, nothing mutable.
struct WorkerContext<P> {
    policy: Arc<P>,
    noise: Arc<NoiseTable>,
    env_factory: EnvFactory,
    normalizer: Option<ObservationNormalizer>,
    rollout_cfg: RolloutConfig,
}

impl<P: Policy> WorkerContext<P> {
    fn eval(&self, base_params: &[f32], offset: usize) -> Result<RolloutResult> {
        evaluate_pair(
            &*self.env_factory,
            &*self.policy,
            base_params,
            &self.noise,
            offset,
            self.normalizer.as_ref(),
            &self.rollout_cfg,
        )
    }
}

/// Draw an offset not yet used this epoch. Cross-epoch collisions are fine —
/// the table is reused — but within an epoch every sample gets a fresh slice.
fn fresh_offset(
    noise: &NoiseTable,
    rng: &mut ChaCha8Rng,
    count: usize,
    used: &mut HashSet<usize>,
) -> Result<usize> {
    for _ in 0..1024 {
        let offset = noise.sample_offset(rng, count)?;
        if used.insert(offset) {
            return Ok(offset);
        }
    }
    Err(Error::configuration(
        "noise table too small to draw fresh offsets for this epoch",
    ))
}

fn failure_budget(budget: &SamplingBudget) -> usize {
    (2 * budget.n_rollouts).max(16)
}

/// In-process sequential collector — one rollout after another, fully
/// deterministic ordering. The "dummy" distribution mode.
pub struct SequentialCollector<P> {
    ctx: WorkerContext<P>,
    budget: SamplingBudget,
    rng: ChaCha8Rng,
}

impl<P: Policy> SequentialCollector<P> {
    pub fn new(
        policy: Arc<P>,
        noise: Arc<NoiseTable>,
        env_factory: EnvFactory,
        cfg: &EsConfig,
        agent_instance_seed: u64,
        sampling_seed: u64,
    ) -> Self {
        SequentialCollector {
            ctx: WorkerContext {
                policy,
                noise,
                env_factory,
                normalizer: None,
                rollout_cfg: RolloutConfig {
                    noise_stddev: cfg.noise_stddev,
                    max_steps: cfg.max_steps,
                    n_eval_episodes: cfg.n_eval_episodes,
                    agent_instance_seed,
                },
            },
            budget: SamplingBudget::from_config(cfg),
            rng: ChaCha8Rng::seed_from_u64(sampling_seed),
        }
    }

    pub fn with_normalizer(mut self, normalizer: ObservationNormalizer) -> Self {
        self.ctx.normalizer = Some(normalizer);
        self
    }
}

impl<P: Policy> RolloutCollector for SequentialCollector<P> {
    fn collect(&mut self, base_params: &[f32]) -> Result<EpochBatch> {
        let mut batch = EpochBatch::default();
        let mut used = HashSet::new();
        let mut failures = 0usize;
        let max_failures = failure_budget(&self.budget);

        while !self
            .budget
            .is_met(batch.n_samples(), batch.total_timesteps())
        {
            let offset = fresh_offset(&self.ctx.noise, &mut self.rng, base_params.len(), &mut used)?;
            match self.ctx.eval(base_params, offset) {
                Ok(result) => batch.push(result),
                Err(e) => {
                    failures += 1;
                    warn!(offset, failures, "dropping failed rollout: {e}");
                    if failures >= max_failures {
                        warn!("rollout failure budget exhausted, returning partial batch");
                        break;
                    }
                }
            }
        }
        Ok(batch)
    }
}

/// Rayon-pooled collector. Dispatches chunks of fresh offsets to the worker
/// pool and aggregates until the budget is met. A failed rollout only drops
/// that sample; other in-flight evaluations are never cancelled.
pub struct PooledCollector<P> {
    ctx: WorkerContext<P>,
    budget: SamplingBudget,
    rng: ChaCha8Rng,
}

impl<P: Policy> PooledCollector<P> {
    pub fn new(
        policy: Arc<P>,
        noise: Arc<NoiseTable>,
        env_factory: EnvFactory,
        cfg: &EsConfig,
        agent_instance_seed: u64,
        sampling_seed: u64,
    ) -> Self {
        PooledCollector {
            ctx: WorkerContext {
                policy,
                noise,
                env_factory,
                normalizer: None,
                rollout_cfg: RolloutConfig {
                    noise_stddev: cfg.noise_stddev,
                    max_steps: cfg.max_steps,
                    n_eval_episodes: cfg.n_eval_episodes,
                    agent_instance_seed,
                },
            },
            budget: SamplingBudget::from_config(cfg),
            rng: ChaCha8Rng::seed_from_u64(sampling_seed),
        }
    }

    pub fn with_normalizer(mut self, normalizer: ObservationNormalizer) -> Self {
        self.ctx.normalizer = Some(normalizer);
        self
    }

    fn chunk_size(&self, collected: usize) -> usize {
        if self.budget.n_rollouts > collected {
            self.budget.n_rollouts - collected
        } else {
            // Timestep-driven tail: keep the pool busy without overshooting
            // the budget by a whole population.
            rayon::current_num_threads().max(1)
        }
    }
}

impl<P: Policy> RolloutCollector for PooledCollector<P> {
    fn collect(&mut self, base_params: &[f32]) -> Result<EpochBatch> {
        let mut batch = EpochBatch::default();
        let mut used = HashSet::new();
        let mut failures = 0usize;
        let max_failures = failure_budget(&self.budget);

        while !self
            .budget
            .is_met(batch.n_samples(), batch.total_timesteps())
        {
            let want = self.chunk_size(batch.n_samples());
            let mut offsets = Vec::with_capacity(want);
            for _ in 0..want {
                offsets.push(fresh_offset(
                    &self.ctx.noise,
                    &mut self.rng,
                    base_params.len(),
                    &mut used,
                )?);
            }

            let ctx = &self.ctx;
            let outcomes: Vec<(usize, Result<RolloutResult>)> = offsets
                .par_iter()
                .map(|&offset| (offset, ctx.eval(base_params, offset)))
                .collect();

            for (offset, outcome) in outcomes {
                match outcome {
                    Ok(result) => batch.push(result),
                    Err(e) => {
                        failures += 1;
                        warn!(offset, failures, "dropping failed rollout: {e}");
                    }
                }
            }
            if failures >= max_failures {
                warn!("rollout failure budget exhausted, returning partial batch");
                break;
            }
        }
        Ok(batch)
    }
}
