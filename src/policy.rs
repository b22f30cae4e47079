//! Flat-parameter policies — forward pass only, no backprop.
//!
//! The trainer owns a flat parameter vector and never inspects network
//! internals; a policy just maps `(observation, params)` to an action.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::env::{Action, ActionSpace};

/// A policy with a stable, deterministic flattening of its weights.
///
/// `act` must be a pure function of `(obs, params)` so that workers can
/// evaluate perturbed copies concurrently from read-only snapshots.
pub trait Policy: Send + Sync {
    /// Length of the flat parameter vector.
    fn n_params(&self) -> usize;

    /// Forward pass: observation → action, given flat parameters.
    fn act(&self, obs: &[f32], params: &[f32]) -> Action;
}

/// Feed-forward tanh network over a flat f32 parameter vector.
///
/// Flattening order: per layer, row-major weights (fan_in × fan_out) followed
/// by biases. Discrete heads pick the argmax logit; continuous heads squash
/// with tanh.
#[derive(Debug, Clone)]
pub struct FeedForwardPolicy {
    obs_dim: usize,
    action_space: ActionSpace,
    /// [(fan_in, fan_out), ...]
    layer_dims: Vec<(usize, usize)>,
    n_params: usize,
}

impl FeedForwardPolicy {
    pub fn new(obs_dim: usize, hidden: &[usize], action_space: ActionSpace) -> Self {
        let mut dims = Vec::new();
        let mut prev = obs_dim;
        for &h in hidden {
            dims.push((prev, h));
            prev = h;
        }
        dims.push((prev, action_space.size()));

        let n_params = dims.iter().map(|(i, o)| i * o + o).sum();

        FeedForwardPolicy {
            obs_dim,
            action_space,
            layer_dims: dims,
            n_params,
        }
    }

    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// Xavier-style initial parameter vector from an explicit seed.
    pub fn init_params(&self, seed: u64) -> Vec<f32> {
        let mut params = vec![0.0f32; self.n_params];
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut offset = 0;
        for &(fan_in, fan_out) in &self.layer_dims {
            let std = (2.0 / (fan_in + fan_out) as f64).sqrt();
            for p in &mut params[offset..offset + fan_in * fan_out] {
                let z: f64 = rng.sample(StandardNormal);
                *p = (z * std) as f32;
            }
            // Biases stay zero.
            offset += fan_in * fan_out + fan_out;
        }
        params
    }

    fn forward(&self, obs: &[f32], params: &[f32]) -> Vec<f32> {
        debug_assert_eq!(params.len(), self.n_params);
        debug_assert_eq!(obs.len(), self.obs_dim);

        let mut x: Vec<f32> = obs.to_vec();
        let mut offset = 0;

        for (layer_idx, &(fan_in, fan_out)) in self.layer_dims.iter().enumerate() {
            let weights = &params[offset..offset + fan_in * fan_out];
            offset += fan_in * fan_out;
            let biases = &params[offset..offset + fan_out];
            offset += fan_out;

            let mut out = vec![0.0f32; fan_out];
            for j in 0..fan_out {
                let mut sum = biases[j];
                for i in 0..fan_in {
                    sum += x[i] * weights[i * fan_out + j];
                }
                out[j] = sum;
            }

            // tanh on hidden layers, raw logits on the output layer
            if layer_idx != self.layer_dims.len() - 1 {
                for v in &mut out {
                    *v = v.tanh();
                }
            }
            x = out;
        }
        x
    }
}

impl Policy for FeedForwardPolicy {
    fn n_params(&self) -> usize {
        self.n_params
    }

    fn act(&self, obs: &[f32], params: &[f32]) -> Action {
        let logits = self.forward(obs, params);
        match self.action_space {
            ActionSpace::Discrete(_) => {
                let best = logits
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                Action::Discrete(best)
            }
            ActionSpace::Continuous(_) => {
                Action::Continuous(logits.iter().map(|v| v.tanh()).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_count() {
        // 8→64→32→4 = (8*64+64) + (64*32+32) + (32*4+4) = 2788
        let p = FeedForwardPolicy::new(8, &[64, 32], ActionSpace::Discrete(4));
        assert_eq!(p.n_params(), 2788);
    }

    #[test]
    fn test_act_discrete_in_range() {
        let p = FeedForwardPolicy::new(4, &[8], ActionSpace::Discrete(2));
        let params = p.init_params(1);
        match p.act(&[1.0, 0.0, -0.5, 0.2], &params) {
            Action::Discrete(a) => assert!(a < 2),
            _ => panic!("expected discrete action"),
        }
    }

    #[test]
    fn test_act_continuous_bounded() {
        let p = FeedForwardPolicy::new(4, &[8], ActionSpace::Continuous(3));
        let params = p.init_params(2);
        match p.act(&[1.0, 0.5, -0.5, 0.0], &params) {
            Action::Continuous(v) => {
                assert_eq!(v.len(), 3);
                assert!(v.iter().all(|a| (-1.0..=1.0).contains(a)));
            }
            _ => panic!("expected continuous action"),
        }
    }

    #[test]
    fn test_init_deterministic() {
        let p = FeedForwardPolicy::new(6, &[16], ActionSpace::Discrete(3));
        assert_eq!(p.init_params(42), p.init_params(42));
        assert_ne!(p.init_params(42), p.init_params(43));
    }
}
