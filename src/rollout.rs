//! Antithetic rollout evaluation.
//!
//! A worker receives only `(noise_offset, stddev)` and reconstructs both
//! perturbations locally from the shared noise table — no vector transfer.
//! Each offset is evaluated with sign +1 and sign -1 as a matched pair.

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::noise::NoiseTable;
use crate::policy::Policy;
use crate::seeding::episode_seed;

/// Creates a fresh environment instance. Workers never share environments;
/// each evaluation builds its own from the factory.
pub type EnvFactory = Box<dyn Fn() -> Box<dyn Environment> + Send + Sync>;

/// Fitness and resource usage for one antithetic pair.
#[derive(Debug, Clone)]
pub struct RolloutResult {
    pub noise_offset: usize,
    pub reward_pos: f64,
    pub reward_neg: f64,
    pub steps_pos: u64,
    pub steps_neg: u64,
}

impl RolloutResult {
    pub fn total_steps(&self) -> u64 {
        self.steps_pos + self.steps_neg
    }
}

/// Per-rollout settings handed to workers.
#[derive(Debug, Clone)]
pub struct RolloutConfig {
    pub noise_stddev: f64,
    /// Total step cap per perturbation sign (0 = unbounded).
    pub max_steps: usize,
    pub n_eval_episodes: usize,
    pub agent_instance_seed: u64,
}

/// Running observation statistics, externally owned and read-only here.
#[derive(Debug, Clone)]
pub struct ObservationNormalizer {
    pub mean: Vec<f32>,
    pub stddev: Vec<f32>,
}

impl ObservationNormalizer {
    pub fn apply(&self, obs: &mut [f32]) {
        for (i, v) in obs.iter_mut().enumerate() {
            *v = (*v - self.mean[i]) / self.stddev[i].max(1e-8);
        }
    }
}

/// `base + sign * stddev * noise`, exact mirror around base for sign = ±1.
pub fn perturb(base: &[f32], noise: &[f32], sign: f32, stddev: f32) -> Vec<f32> {
    debug_assert_eq!(base.len(), noise.len());
    base.iter()
        .zip(noise)
        .map(|(&b, &n)| b + sign * stddev * n)
        .collect()
}

/// Evaluate the antithetic pair for one offset.
///
/// Deterministic for fixed `(base_params, offset, policy, environment,
/// agent_instance_seed)`: episode seeds are derived, never ambient.
pub fn evaluate_pair<P: Policy + ?Sized>(
    env_factory: &(dyn Fn() -> Box<dyn Environment> + Send + Sync),
    policy: &P,
    base_params: &[f32],
    noise: &NoiseTable,
    offset: usize,
    normalizer: Option<&ObservationNormalizer>,
    cfg: &RolloutConfig,
) -> Result<RolloutResult> {
    let slice = noise.get(offset, base_params.len());
    let mut rewards = [0.0f64; 2];
    let mut steps = [0u64; 2];

    for (arm, &sign) in [1i8, -1i8].iter().enumerate() {
        let perturbed = perturb(base_params, slice, sign as f32, cfg.noise_stddev as f32);

        for ep in 0..cfg.n_eval_episodes {
            if cfg.max_steps > 0 && steps[arm] >= cfg.max_steps as u64 {
                break;
            }
            let mut env = env_factory();
            let seed = episode_seed(cfg.agent_instance_seed, offset, sign, ep);
            let mut obs = env
                .reset(seed)
                .map_err(|e| Error::rollout(format!("reset (offset {offset}, ep {ep}): {e}")))?;
            if let Some(norm) = normalizer {
                norm.apply(&mut obs);
            }

            loop {
                let action = policy.act(&obs, &perturbed);
                let result = env.step(&action).map_err(|e| {
                    Error::rollout(format!("step (offset {offset}, ep {ep}): {e}"))
                })?;
                rewards[arm] += result.reward;
                steps[arm] += 1;
                if result.done() || (cfg.max_steps > 0 && steps[arm] >= cfg.max_steps as u64) {
                    break;
                }
                obs = result.observation;
                if let Some(norm) = normalizer {
                    norm.apply(&mut obs);
                }
            }
        }
    }

    Ok(RolloutResult {
        noise_offset: offset,
        reward_pos: rewards[0],
        reward_neg: rewards[1],
        steps_pos: steps[0],
        steps_neg: steps[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::cartpole::{self, CartPole};
    use crate::policy::FeedForwardPolicy;

    fn cartpole_factory() -> EnvFactory {
        Box::new(|| Box::new(CartPole::new()) as Box<dyn Environment>)
    }

    #[test]
    fn test_perturb_antithetic_mirror() {
        let base = vec![0.5f32, -1.0, 2.0, 0.0];
        let noise = vec![1.0f32, -0.5, 0.25, 3.0];
        let plus = perturb(&base, &noise, 1.0, 0.1);
        let minus = perturb(&base, &noise, -1.0, 0.1);
        for i in 0..base.len() {
            assert_eq!(plus[i] + minus[i], 2.0 * base[i]);
        }
    }

    #[test]
    fn test_evaluate_pair_reproducible() {
        let policy = FeedForwardPolicy::new(cartpole::OBS_DIM, &[8], cartpole::ACTION_SPACE);
        let params = policy.init_params(5);
        let noise = NoiseTable::new(10_000, 11).unwrap();
        let cfg = RolloutConfig {
            noise_stddev: 0.05,
            max_steps: 0,
            n_eval_episodes: 2,
            agent_instance_seed: 17,
        };
        let factory = cartpole_factory();
        let a = evaluate_pair(&*factory, &policy, &params, &noise, 100, None, &cfg).unwrap();
        let b = evaluate_pair(&*factory, &policy, &params, &noise, 100, None, &cfg).unwrap();
        assert_eq!(a.reward_pos, b.reward_pos);
        assert_eq!(a.reward_neg, b.reward_neg);
        assert_eq!(a.steps_pos, b.steps_pos);
        assert_eq!(a.steps_neg, b.steps_neg);
    }

    #[test]
    fn test_max_steps_caps_each_arm() {
        let policy = FeedForwardPolicy::new(cartpole::OBS_DIM, &[8], cartpole::ACTION_SPACE);
        let params = policy.init_params(5);
        let noise = NoiseTable::new(10_000, 11).unwrap();
        let cfg = RolloutConfig {
            noise_stddev: 0.05,
            max_steps: 7,
            n_eval_episodes: 10,
            agent_instance_seed: 17,
        };
        let factory = cartpole_factory();
        let r = evaluate_pair(&*factory, &policy, &params, &noise, 0, None, &cfg).unwrap();
        assert!(r.steps_pos <= 7);
        assert!(r.steps_neg <= 7);
    }

    #[test]
    fn test_normalizer_centers_and_scales() {
        let norm = ObservationNormalizer {
            mean: vec![1.0, -2.0],
            stddev: vec![2.0, 0.5],
        };
        let mut obs = vec![3.0f32, -1.0];
        norm.apply(&mut obs);
        assert_eq!(obs, vec![1.0, 2.0]);
    }
}
