//! Shared noise table: a precomputed block of standard-normal samples.
//!
//! Perturbation vectors can be hundreds of thousands of floats. Instead of
//! shipping them between coordinator and workers, every worker shares one
//! read-only table and reconstructs the exact perturbation from a single
//! integer offset. The table is filled once from a master seed and never
//! mutated, so concurrent reads need no locking.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct NoiseTable {
    values: Vec<f32>,
    master_seed: u64,
}

impl NoiseTable {
    /// Fill `count` standard-normal f32 samples from `master_seed`.
    /// Same seed and count always produce the identical table.
    pub fn new(count: usize, master_seed: u64) -> Result<Self> {
        if count == 0 {
            return Err(Error::configuration("noise table size must be > 0"));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(master_seed);
        let values = (0..count).map(|_| rng.sample(StandardNormal)).collect();
        Ok(NoiseTable {
            values,
            master_seed,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Slice of `count` samples starting at `offset`.
    ///
    /// Offsets come from `sample_offset`, which guarantees
    /// `offset + count <= len`.
    pub fn get(&self, offset: usize, count: usize) -> &[f32] {
        debug_assert!(offset + count <= self.values.len());
        &self.values[offset..offset + count]
    }

    /// Draw a uniform offset such that a `count`-long slice stays in bounds.
    pub fn sample_offset<R: Rng>(&self, rng: &mut R, count: usize) -> Result<usize> {
        if count == 0 || count > self.values.len() {
            return Err(Error::configuration(format!(
                "cannot slice {} samples from a table of {}",
                count,
                self.values.len()
            )));
        }
        Ok(rng.gen_range(0..=self.values.len() - count))
    }
}
