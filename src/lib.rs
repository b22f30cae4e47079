//! Evolution Strategies training core — gradient-free policy optimization.
//!
//! Architecture:
//! - `noise`: shared noise table (perturbations as integer offsets)
//! - `optim`: Adam optimizer over the gradient estimate
//! - `policy` / `env`: flat-parameter policies and gym-style environments
//! - `rollout`: antithetic pair evaluation
//! - `distributed`: sequential and rayon-pooled batch collectors
//! - `trainer`: rank shaping, L2 decay, the epoch loop
//!
//! Sampling is reproducible end to end: the noise table comes from one
//! master seed, offsets from an explicit sampling seed, and episode seeds
//! are derived per `(agent seed, offset, sign, episode)`. No global
//! randomness anywhere.

pub mod config;
pub mod distributed;
pub mod env;
pub mod error;
pub mod noise;
pub mod optim;
pub mod policy;
pub mod rollout;
pub mod seeding;
pub mod stats;
pub mod trainer;

pub use config::EsConfig;
pub use distributed::{EpochBatch, PooledCollector, RolloutCollector, SamplingBudget, SequentialCollector};
pub use error::{Error, Result};
pub use noise::NoiseTable;
pub use optim::Adam;
pub use policy::{FeedForwardPolicy, Policy};
pub use rollout::{ObservationNormalizer, RolloutConfig, RolloutResult};
pub use stats::{EpochStats, MemorySink, ModelSelection, RewardThreshold, StatsSink, TracingSink};
pub use trainer::EsTrainer;
