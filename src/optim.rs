//! Adam optimizer for the ES gradient estimate.
//!
//! Reference: Kingma & Ba 2015. The trainer maximizes expected fitness, so
//! `step` returns an *ascent* delta — the caller adds it to the parameters.

/// Per-parameter moment tracker. Owns its state exclusively; never inspects
/// the policy or the environment.
#[derive(Debug)]
pub struct Adam {
    step_size: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    /// First-moment running average, allocated on first `step`.
    m: Vec<f64>,
    /// Second-moment running average.
    v: Vec<f64>,
    /// Step counter for bias correction.
    t: u64,
}

impl Adam {
    /// Fresh optimizer with standard decay rates (β1=0.9, β2=0.999, ε=1e-8).
    pub fn new(step_size: f64) -> Self {
        Adam::with_hyperparams(step_size, 0.9, 0.999, 1e-8)
    }

    pub fn with_hyperparams(step_size: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Adam {
            step_size,
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Number of updates applied so far.
    pub fn steps(&self) -> u64 {
        self.t
    }

    /// Compute a parameter delta from a gradient estimate.
    ///
    /// Pure function of the accumulated moments and the new gradient:
    /// identical gradient sequences from fresh instances yield identical
    /// delta sequences.
    pub fn step(&mut self, gradient: &[f64]) -> Vec<f64> {
        if self.m.is_empty() {
            self.m = vec![0.0; gradient.len()];
            self.v = vec![0.0; gradient.len()];
        }
        assert_eq!(gradient.len(), self.m.len(), "gradient shape changed");

        self.t += 1;
        // Fold both bias corrections into one scale factor.
        let a = self.step_size * (1.0 - self.beta2.powi(self.t as i32)).sqrt()
            / (1.0 - self.beta1.powi(self.t as i32));

        let mut delta = vec![0.0; gradient.len()];
        for i in 0..gradient.len() {
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * gradient[i];
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * gradient[i] * gradient[i];
            delta[i] = a * self.m[i] / (self.v[i].sqrt() + self.epsilon);
        }
        delta
    }
}
