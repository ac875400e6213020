//! Entropy coefficient tuning.
//!
//! With an automatic coefficient, `log α` is learned so the policy's entropy
//! tracks a target:
//!
//! ```text
//! L(α) = -log α * (E[log π(a|s)] + H_target)
//! ∂L/∂log α = -(E[log π(a|s)] + H_target)
//! ```
//!
//! `log α` is a single scalar, so its Adam step is applied directly to the
//! value instead of going through a module optimizer.

use serde::{Deserialize, Serialize};

use super::config::EntCoef;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Fixed or learned entropy coefficient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropyTuner {
    log_alpha: f64,
    target_entropy: f32,
    auto: bool,
    m: f64,
    v: f64,
    t: i32,
}

impl EntropyTuner {
    pub fn new(ent_coef: EntCoef, target_entropy: f32) -> Self {
        let (init, auto) = match ent_coef {
            EntCoef::Auto { init } => (init, true),
            EntCoef::Fixed(value) => (value, false),
        };
        Self {
            log_alpha: (init as f64).ln(),
            target_entropy,
            auto,
            m: 0.0,
            v: 0.0,
            t: 0,
        }
    }

    /// Current `α = exp(log α)`.
    pub fn alpha(&self) -> f32 {
        self.log_alpha.exp() as f32
    }

    pub fn log_alpha(&self) -> f64 {
        self.log_alpha
    }

    pub fn target_entropy(&self) -> f32 {
        self.target_entropy
    }

    pub fn is_auto(&self) -> bool {
        self.auto
    }

    /// One Adam step on `log α` given the batch's mean log-probability.
    ///
    /// Returns the entropy loss, or `None` for a fixed coefficient.
    pub fn update(&mut self, mean_log_prob: f32, lr: f64) -> Option<f32> {
        if !self.auto {
            return None;
        }
        let signal = (mean_log_prob + self.target_entropy) as f64;
        let loss = -(self.log_alpha * signal);
        let grad = -signal;

        self.t += 1;
        self.m = BETA1 * self.m + (1.0 - BETA1) * grad;
        self.v = BETA2 * self.v + (1.0 - BETA2) * grad * grad;
        let m_hat = self.m / (1.0 - BETA1.powi(self.t));
        let v_hat = self.v / (1.0 - BETA2.powi(self.t));
        self.log_alpha -= lr * m_hat / (v_hat.sqrt() + ADAM_EPS);

        Some(loss as f32)
    }
}
