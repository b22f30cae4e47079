//! The ES update rule and the epoch loop.
//!
//! Per epoch: collect a batch of antithetic rollout results, rank-shape the
//! pooled rewards, assemble the gradient estimate from the noise table,
//! apply weight decay, step Adam (ascent), update the parameters in place.
//! Reference: Salimans et al. 2017 (OpenAI-ES).

use std::sync::Arc;
use std::time::Instant;

use crate::config::EsConfig;
use crate::distributed::{EpochBatch, RolloutCollector};
use crate::error::{Error, Result};
use crate::noise::NoiseTable;
use crate::optim::Adam;
use crate::stats::{EpochStats, ModelSelection, StatsSink};

/// Centered ranks in [-0.5, 0.5], ties averaged.
///
/// Bounds outlier influence while preserving ordering. Tie averaging matters:
/// a sample whose positive and negative arms scored the same must contribute
/// exactly zero signal.
pub fn centered_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[indices[j + 1]] == values[indices[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0;
        for k in i..=j {
            ranks[indices[k]] = avg;
        }
        i = j + 1;
    }

    ranks
        .iter()
        .map(|r| r / (n - 1) as f64 - 0.5)
        .collect()
}

/// Gradient-free trainer. Exclusively owns the parameter vector; collectors
/// only ever see read-only snapshots for the duration of a batch.
#[derive(Debug)]
pub struct EsTrainer {
    config: EsConfig,
    params: Vec<f32>,
    optimizer: Adam,
    noise: Arc<NoiseTable>,
    epoch: usize,
}

impl EsTrainer {
    pub fn new(config: EsConfig, initial_params: Vec<f32>, noise: Arc<NoiseTable>) -> Result<Self> {
        config.validate()?;
        if initial_params.is_empty() {
            return Err(Error::configuration("initial parameter vector is empty"));
        }
        if initial_params.iter().any(|p| !p.is_finite()) {
            return Err(Error::configuration(
                "initial parameter vector contains non-finite values",
            ));
        }
        if noise.len() < initial_params.len() {
            return Err(Error::configuration(format!(
                "noise table ({} samples) is smaller than the parameter vector ({})",
                noise.len(),
                initial_params.len()
            )));
        }
        let optimizer = Adam::new(config.step_size);
        Ok(EsTrainer {
            config,
            params: initial_params,
            optimizer,
            noise,
            epoch: 0,
        })
    }

    /// Parameters after the last successful epoch — available even when
    /// training aborted mid-run.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn config(&self) -> &EsConfig {
        &self.config
    }

    /// Run up to `n_epochs` epochs, stopping early only when the model
    /// selection collaborator says so.
    pub fn train(
        &mut self,
        collector: &mut dyn RolloutCollector,
        sink: &mut dyn StatsSink,
        mut model_selection: Option<&mut dyn ModelSelection>,
    ) -> Result<()> {
        while self.epoch < self.config.n_epochs {
            let stats = self.train_epoch(collector)?;
            sink.log(&stats);
            if let Some(selection) = model_selection.as_mut() {
                if selection.should_stop(stats.epoch, &stats) {
                    tracing::info!(epoch = stats.epoch, "early stop requested");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One epoch: CollectBatch → ComputeUpdate → ApplyUpdate.
    pub fn train_epoch(&mut self, collector: &mut dyn RolloutCollector) -> Result<EpochStats> {
        let start = Instant::now();
        let epoch = self.epoch;

        let batch = collector.collect(&self.params)?;
        if batch.is_empty() {
            return Err(Error::EmptyBatch { epoch });
        }

        let gradient = self.compute_update(&batch)?;
        let delta = self.optimizer.step(&gradient);
        for (p, d) in self.params.iter_mut().zip(&delta) {
            *p += *d as f32;
        }
        self.epoch += 1;

        let rewards: Vec<f64> = batch
            .results()
            .iter()
            .flat_map(|r| [r.reward_pos, r.reward_neg])
            .collect();
        let reward_mean = rewards.iter().sum::<f64>() / rewards.len() as f64;
        let reward_std = (rewards
            .iter()
            .map(|r| (r - reward_mean).powi(2))
            .sum::<f64>()
            / rewards.len() as f64)
            .sqrt();

        Ok(EpochStats {
            epoch,
            reward_mean,
            reward_std,
            n_rollouts: batch.n_samples(),
            n_timesteps: batch.total_timesteps(),
            params_norm: self.params.iter().map(|&p| (p as f64).powi(2)).sum::<f64>().sqrt(),
            update_norm: delta.iter().map(|d| d * d).sum::<f64>().sqrt(),
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Rank-shaped gradient estimate of expected fitness, with L2 decay.
    ///
    /// Validated before any state is touched: a NaN/Inf anywhere aborts the
    /// epoch instead of leaking into the parameter vector.
    fn compute_update(&self, batch: &EpochBatch) -> Result<Vec<f64>> {
        let n = self.params.len();
        let samples = batch.results();

        let mut rewards = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            if !s.reward_pos.is_finite() || !s.reward_neg.is_finite() {
                return Err(Error::numerical(format!(
                    "non-finite reward at offset {}",
                    s.noise_offset
                )));
            }
            rewards.push(s.reward_pos);
            rewards.push(s.reward_neg);
        }

        let shaped = centered_ranks(&rewards);

        let mut gradient = vec![0.0f64; n];
        for (i, s) in samples.iter().enumerate() {
            let rank_diff = shaped[2 * i] - shaped[2 * i + 1];
            if rank_diff == 0.0 {
                continue;
            }
            let slice = self.noise.get(s.noise_offset, n);
            for (g, &z) in gradient.iter_mut().zip(slice) {
                *g += rank_diff * z as f64;
            }
        }

        let scale = 1.0 / (samples.len() as f64 * self.config.noise_stddev);
        for (g, &p) in gradient.iter_mut().zip(&self.params) {
            *g = *g * scale - self.config.l2_penalty * p as f64;
        }
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(Error::numerical("non-finite gradient estimate"));
        }
        Ok(gradient)
    }
}
