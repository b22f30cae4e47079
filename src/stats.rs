//! Per-epoch training statistics and the collaborator traits that consume
//! them: a write-only stats sink and an optional early-stop hook.

use serde::Serialize;

/// Scalars emitted once per epoch. Observable side effect only — nothing in
/// the update rule reads these back.
#[derive(Debug, Clone, Serialize)]
pub struct EpochStats {
    pub epoch: usize,
    /// Mean of raw (unshaped) rewards, pooled over both antithetic arms.
    pub reward_mean: f64,
    pub reward_std: f64,
    /// Antithetic pairs in the batch.
    pub n_rollouts: usize,
    /// Environment timesteps consumed by the batch.
    pub n_timesteps: u64,
    pub params_norm: f64,
    pub update_norm: f64,
    pub duration_secs: f64,
}

/// Write-only sink of per-epoch scalars.
pub trait StatsSink {
    fn log(&mut self, stats: &EpochStats);
}

/// Emits one structured log line per epoch.
#[derive(Debug, Default)]
pub struct TracingSink;

impl StatsSink for TracingSink {
    fn log(&mut self, stats: &EpochStats) {
        tracing::info!(
            epoch = stats.epoch,
            reward_mean = format_args!("{:.2}", stats.reward_mean),
            reward_std = format_args!("{:.2}", stats.reward_std),
            rollouts = stats.n_rollouts,
            timesteps = stats.n_timesteps,
            params_norm = format_args!("{:.4}", stats.params_norm),
            update_norm = format_args!("{:.6}", stats.update_norm),
            secs = format_args!("{:.2}", stats.duration_secs),
            "epoch complete"
        );
    }
}

/// Records every epoch; used by tests and the demo binary's final summary.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub epochs: Vec<EpochStats>,
}

impl StatsSink for MemorySink {
    fn log(&mut self, stats: &EpochStats) {
        self.epochs.push(stats.clone());
    }
}

/// Optional early-stop collaborator, consulted once per epoch boundary.
/// Absent means "never stop early".
pub trait ModelSelection {
    fn should_stop(&mut self, epoch: usize, stats: &EpochStats) -> bool;
}

/// Stop once the mean reward reaches a threshold.
#[derive(Debug, Clone)]
pub struct RewardThreshold {
    pub threshold: f64,
}

impl ModelSelection for RewardThreshold {
    fn should_stop(&mut self, _epoch: usize, stats: &EpochStats) -> bool {
        stats.reward_mean >= self.threshold
    }
}
