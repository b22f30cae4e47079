//! Deterministic seed derivation.
//!
//! Every random draw in the core takes an explicit seed or generator; there
//! is no ambient global randomness. Workers derive their episode seeds from
//! the agent instance seed plus the noise offset, so a rollout is fully
//! reproducible from `(base_params, offset, sign, agent_instance_seed)`.

/// splitmix64 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Episode seed for one rollout episode of one antithetic arm.
pub fn episode_seed(agent_instance_seed: u64, noise_offset: usize, sign: i8, episode: usize) -> u64 {
    let mut z = mix64(agent_instance_seed);
    z = mix64(z ^ noise_offset as u64);
    z = mix64(z ^ (sign as i64 as u64));
    mix64(z ^ episode as u64)
}
