//! Environment abstraction.
//!
//! Mirrors gymnasium's reset/step API. The trainer treats environments as
//! opaque, possibly stochastic steppers; a fatal simulator error surfaces
//! through the `Result` and is handled by the rollout collector.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::Result;

/// Action space type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionSpace {
    /// Discrete actions: 0..n
    Discrete(usize),
    /// Continuous actions: n-dimensional vector in [-1, 1]
    Continuous(usize),
}

impl ActionSpace {
    pub fn size(&self) -> usize {
        match self {
            ActionSpace::Discrete(n) => *n,
            ActionSpace::Continuous(n) => *n,
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, ActionSpace::Discrete(_))
    }
}

/// Action passed to an environment.
#[derive(Debug, Clone)]
pub enum Action {
    Discrete(usize),
    Continuous(Vec<f32>),
}

/// Result of a single step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Vec<f32>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
}

impl StepResult {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// The core environment trait.
///
/// `reset` takes an explicit seed — episode randomness is always traceable
/// to the caller, never to a hidden global generator.
pub trait Environment {
    /// Reset to an initial state, returns the first observation.
    fn reset(&mut self, seed: u64) -> Result<Vec<f32>>;

    /// Take an action. An `Err` means the episode is unrecoverable and the
    /// whole rollout will be dropped and resampled.
    fn step(&mut self, action: &Action) -> Result<StepResult>;
}

// ─── CartPole (pure Rust classic control) ─────────────────────────────

pub mod cartpole {
    use super::*;

    pub const OBS_DIM: usize = 4;
    pub const ACTION_SPACE: ActionSpace = ActionSpace::Discrete(2);

    const GRAVITY: f64 = 9.8;
    const CART_MASS: f64 = 1.0;
    const POLE_MASS: f64 = 0.1;
    const TOTAL_MASS: f64 = CART_MASS + POLE_MASS;
    const POLE_HALF_LENGTH: f64 = 0.5;
    const FORCE_MAG: f64 = 10.0;
    const TAU: f64 = 0.02; // timestep
    const X_THRESHOLD: f64 = 2.4;
    const THETA_THRESHOLD: f64 = 12.0 * std::f64::consts::PI / 180.0;

    pub struct CartPole {
        state: [f64; 4], // x, x_dot, theta, theta_dot
        step_count: usize,
        max_episode_steps: usize,
        rng: ChaCha8Rng,
    }

    impl CartPole {
        pub fn new() -> Self {
            CartPole {
                state: [0.0; 4],
                step_count: 0,
                max_episode_steps: 500,
                rng: ChaCha8Rng::seed_from_u64(0),
            }
        }
    }

    impl Default for CartPole {
        fn default() -> Self {
            CartPole::new()
        }
    }

    impl Environment for CartPole {
        fn reset(&mut self, seed: u64) -> Result<Vec<f32>> {
            self.rng = ChaCha8Rng::seed_from_u64(seed);
            for v in &mut self.state {
                *v = self.rng.gen_range(-0.05..0.05);
            }
            self.step_count = 0;
            Ok(self.state.iter().map(|&v| v as f32).collect())
        }

        fn step(&mut self, action: &Action) -> Result<StepResult> {
            let force = match action {
                Action::Discrete(a) => {
                    if *a == 1 {
                        FORCE_MAG
                    } else {
                        -FORCE_MAG
                    }
                }
                Action::Continuous(v) => v[0] as f64 * FORCE_MAG,
            };

            let [x, x_dot, theta, theta_dot] = self.state;
            let cos_theta = theta.cos();
            let sin_theta = theta.sin();

            let temp = (force + POLE_MASS * POLE_HALF_LENGTH * theta_dot * theta_dot * sin_theta)
                / TOTAL_MASS;
            let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
                / (POLE_HALF_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / TOTAL_MASS));
            let x_acc = temp - POLE_MASS * POLE_HALF_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

            // Euler integration
            self.state = [
                x + TAU * x_dot,
                x_dot + TAU * x_acc,
                theta + TAU * theta_dot,
                theta_dot + TAU * theta_acc,
            ];
            self.step_count += 1;

            let terminated =
                self.state[0].abs() > X_THRESHOLD || self.state[2].abs() > THETA_THRESHOLD;
            let truncated = self.step_count >= self.max_episode_steps;

            Ok(StepResult {
                observation: self.state.iter().map(|&v| v as f32).collect(),
                reward: 1.0,
                terminated,
                truncated,
            })
        }
    }
}
