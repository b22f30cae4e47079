//! Error taxonomy for the ES training core.
//!
//! Configuration errors are fatal at construction and never retried.
//! Rollout errors are recovered locally by the collector (resample another
//! offset). Empty batches and numerical instability abort training loudly —
//! never a silent zero update.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid static configuration (bad budgets, non-positive table size, ...).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A single environment/policy execution failed mid-rollout.
    #[error("rollout failed: {0}")]
    Rollout(String),

    /// An epoch produced zero usable rollout results.
    #[error("epoch {epoch} produced no usable rollout results")]
    EmptyBatch { epoch: usize },

    /// NaN/Inf detected in rewards or the gradient estimate.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn rollout(msg: impl Into<String>) -> Self {
        Error::Rollout(msg.into())
    }

    pub fn numerical(msg: impl Into<String>) -> Self {
        Error::NumericalInstability(msg.into())
    }
}
