//! Trainer configuration surface.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hyperparameters recognized by the ES trainer.
///
/// Budgets: `n_rollouts_per_update` and `n_timesteps_per_update` are both
/// minimums; a value of 0 disables that criterion. At least one must be
/// nonzero. When both are nonzero, batch collection continues until both
/// floors are reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsConfig {
    /// Minimum antithetic rollout pairs per update (0 = disabled).
    pub n_rollouts_per_update: usize,
    /// Minimum environment timesteps per update (0 = disabled).
    pub n_timesteps_per_update: usize,
    /// Per-rollout step cap, counted per perturbation sign (0 = unbounded).
    pub max_steps: usize,
    /// Episodes evaluated per perturbation sign.
    pub n_eval_episodes: usize,
    /// Standard deviation of parameter perturbations.
    pub noise_stddev: f64,
    /// Weight-decay coefficient subtracted from the gradient estimate.
    pub l2_penalty: f64,
    /// Number of training epochs.
    pub n_epochs: usize,
    /// Adam step size.
    pub step_size: f64,
}

impl Default for EsConfig {
    fn default() -> Self {
        EsConfig {
            n_rollouts_per_update: 100,
            n_timesteps_per_update: 0,
            max_steps: 0,
            n_eval_episodes: 1,
            noise_stddev: 0.02,
            l2_penalty: 0.005,
            n_epochs: 100,
            step_size: 0.01,
        }
    }
}

impl EsConfig {
    /// Validate the static configuration. Called at trainer construction,
    /// so a bad config fails before the first epoch, not during it.
    pub fn validate(&self) -> Result<()> {
        if self.n_rollouts_per_update == 0 && self.n_timesteps_per_update == 0 {
            return Err(Error::configuration(
                "n_rollouts_per_update and n_timesteps_per_update cannot both be 0",
            ));
        }
        if self.n_eval_episodes == 0 {
            return Err(Error::configuration("n_eval_episodes must be > 0"));
        }
        if !(self.noise_stddev > 0.0) || !self.noise_stddev.is_finite() {
            return Err(Error::configuration(format!(
                "noise_stddev must be > 0, got {}",
                self.noise_stddev
            )));
        }
        if !(self.l2_penalty >= 0.0) || !self.l2_penalty.is_finite() {
            return Err(Error::configuration(format!(
                "l2_penalty must be >= 0, got {}",
                self.l2_penalty
            )));
        }
        if self.n_epochs == 0 {
            return Err(Error::configuration("n_epochs must be > 0"));
        }
        if !(self.step_size > 0.0) || !self.step_size.is_finite() {
            return Err(Error::configuration(format!(
                "step_size must be > 0, got {}",
                self.step_size
            )));
        }
        Ok(())
    }
}
