//! Squashed Gaussian action distributions.
//!
//! Actions are sampled in an unbounded space and squashed with `tanh` into
//! `[-1, 1]`. The log-probability accounts for the change of variables:
//!
//! ```text
//! log π(a|s) = log N(u; μ, σ) - Σ log(1 - tanh²(u))
//! log(1 - tanh²(u)) = 2 * (ln 2 - u - softplus(-2u))
//! ```
//!
//! Two parameterizations exist. The diagonal Gaussian takes a per-sample
//! `log_std` from the actor. State-dependent exploration (gSDE) keeps a
//! learned `log_std` matrix `[latent, action]` and draws noise as
//! `latent @ (exp(log_std) * ε)` with `ε` held fixed between resamples.

use burn::tensor::activation::{softplus, tanh};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;

use crate::nn::init::standard_normal;

pub const LOG_STD_MIN: f32 = -20.0;
pub const LOG_STD_MAX: f32 = 2.0;

const SDE_EPSILON: f32 = 1e-6;
const HALF_LOG_2PI: f32 = 0.918_938_5;

// ============================================================================
// Helpers
// ============================================================================

/// Per-sample `Σ log(1 - tanh²(u))`, computed without evaluating `tanh`.
pub fn squash_correction<B: Backend>(pre_squash: Tensor<B, 2>) -> Tensor<B, 1> {
    let ln2 = std::f32::consts::LN_2;
    let per_dim = (pre_squash.clone().neg().add_scalar(ln2)
        - softplus(pre_squash.mul_scalar(-2.0), 1.0))
    .mul_scalar(2.0);
    per_dim.sum_dim(1).flatten::<1>(0, 1)
}

/// Per-sample diagonal Gaussian log-density summed over action dimensions.
fn gaussian_log_prob<B: Backend>(
    value: Tensor<B, 2>,
    mean: Tensor<B, 2>,
    log_std: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let normalized = (value - mean) / log_std.clone().exp();
    let per_dim = (normalized.powf_scalar(2.0).mul_scalar(-0.5) - log_std).sub_scalar(HALF_LOG_2PI);
    per_dim.sum_dim(1).flatten::<1>(0, 1)
}

/// Map an action from `[-1, 1]` onto `[low, high]`.
pub fn scale_action(action: &[f32], low: &[f32], high: &[f32]) -> Vec<f32> {
    action
        .iter()
        .zip(low.iter().zip(high))
        .map(|(a, (l, h))| {
            if l.is_finite() && h.is_finite() {
                l + 0.5 * (a + 1.0) * (h - l)
            } else {
                *a
            }
        })
        .collect()
}

/// Inverse of [`scale_action`].
pub fn unscale_action(action: &[f32], low: &[f32], high: &[f32]) -> Vec<f32> {
    action
        .iter()
        .zip(low.iter().zip(high))
        .map(|(a, (l, h))| {
            if l.is_finite() && h.is_finite() && h > l {
                2.0 * (a - l) / (h - l) - 1.0
            } else {
                *a
            }
        })
        .collect()
}

// ============================================================================
// State-Dependent Noise
// ============================================================================

/// Exploration weights `ε ~ N(0, 1)` of shape `[latent, action]`.
///
/// The effective exploration matrix is `exp(log_std) * ε`, recomputed from the
/// current `log_std` on every use so gradients reach it.
#[derive(Debug, Clone)]
pub struct StateDependentNoise<B: Backend> {
    eps: Tensor<B, 2>,
}

impl<B: Backend> StateDependentNoise<B> {
    pub fn sample<R: Rng + ?Sized>(
        latent_dim: usize,
        action_dim: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> Self {
        Self {
            eps: standard_normal([latent_dim, action_dim], rng, device),
        }
    }

    pub fn exploration_matrix(&self, log_std: Tensor<B, 2>) -> Tensor<B, 2> {
        log_std.exp() * self.eps.clone()
    }

    pub fn dims(&self) -> [usize; 2] {
        self.eps.dims()
    }
}

// ============================================================================
// Distribution
// ============================================================================

/// Action distribution produced by the actor for a batch of observations.
#[derive(Debug, Clone)]
pub enum ActionDistribution<B: Backend> {
    /// Diagonal Gaussian with per-sample `log_std` `[batch, action]`.
    Gaussian {
        mean: Tensor<B, 2>,
        log_std: Tensor<B, 2>,
    },
    /// gSDE with `log_std` `[latent, action]` and the latent features `[batch, latent]`.
    StateDependent {
        mean: Tensor<B, 2>,
        log_std: Tensor<B, 2>,
        latent: Tensor<B, 2>,
    },
}

/// Squashed sample with its log-probability.
#[derive(Debug, Clone)]
pub struct SquashedSample<B: Backend> {
    /// Actions in `[-1, 1]`, `[batch, action]`.
    pub actions: Tensor<B, 2>,
    /// `[batch]`
    pub log_prob: Tensor<B, 1>,
}

impl<B: Backend> ActionDistribution<B> {
    pub fn mean(&self) -> &Tensor<B, 2> {
        match self {
            ActionDistribution::Gaussian { mean, .. } => mean,
            ActionDistribution::StateDependent { mean, .. } => mean,
        }
    }

    /// Deterministic action: `tanh(mean)`.
    pub fn mode(&self) -> Tensor<B, 2> {
        tanh(self.mean().clone())
    }

    /// Reparameterized sample. Under gSDE the given exploration weights are
    /// used; without them a fresh set is drawn from `rng`.
    pub fn rsample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        sde_noise: Option<&StateDependentNoise<B>>,
    ) -> SquashedSample<B> {
        match self {
            ActionDistribution::Gaussian { mean, log_std } => {
                let device = mean.device();
                let eps: Tensor<B, 2> = standard_normal(mean.dims(), rng, &device);
                let pre_squash = mean.clone() + log_std.clone().exp() * eps;
                let log_prob = gaussian_log_prob(pre_squash.clone(), mean.clone(), log_std.clone())
                    - squash_correction(pre_squash.clone());
                SquashedSample {
                    actions: tanh(pre_squash),
                    log_prob,
                }
            }
            ActionDistribution::StateDependent {
                mean,
                log_std,
                latent,
            } => {
                let [latent_dim, action_dim] = log_std.dims();
                let fresh;
                let noise = match sde_noise {
                    Some(noise) => noise,
                    None => {
                        fresh = StateDependentNoise::sample(latent_dim, action_dim, rng, &mean.device());
                        &fresh
                    }
                };

                let pre_squash =
                    mean.clone() + latent.clone().matmul(noise.exploration_matrix(log_std.clone()));

                // Per-sample std: sqrt(latent² @ σ² + ε)
                let variance = latent
                    .clone()
                    .powf_scalar(2.0)
                    .matmul(log_std.clone().exp().powf_scalar(2.0));
                let sample_log_std = variance.add_scalar(SDE_EPSILON).log().mul_scalar(0.5);

                let log_prob = gaussian_log_prob(pre_squash.clone(), mean.clone(), sample_log_std)
                    - squash_correction(pre_squash.clone());
                SquashedSample {
                    actions: tanh(pre_squash),
                    log_prob,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type B = NdArray<f32>;

    fn to_vec<const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_squash_correction_matches_direct_formula() {
        let device = Default::default();
        let u = Tensor::<B, 2>::from_floats([[0.0, 0.5], [-1.0, 2.0]], &device);
        let got = to_vec(squash_correction(u));
        let direct = |x: f32| (1.0 - x.tanh().powi(2)).ln();
        let expected = [direct(0.0) + direct(0.5), direct(-1.0) + direct(2.0)];
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < 1e-4, "{g} vs {e}");
        }
    }

    #[test]
    fn test_scale_roundtrip_and_bounds() {
        let low = [-2.0, 0.0];
        let high = [2.0, 1.0];
        assert_eq!(scale_action(&[-1.0, -1.0], &low, &high), vec![-2.0, 0.0]);
        assert_eq!(scale_action(&[1.0, 1.0], &low, &high), vec![2.0, 1.0]);
        let back = unscale_action(&scale_action(&[0.3, -0.4], &low, &high), &low, &high);
        assert!((back[0] - 0.3).abs() < 1e-6);
        assert!((back[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_gaussian_sample_is_bounded_and_seeded() {
        let device = Default::default();
        let dist = ActionDistribution::Gaussian {
            mean: Tensor::<B, 2>::zeros([16, 3], &device),
            log_std: Tensor::<B, 2>::zeros([16, 3], &device),
        };
        let a = dist.rsample(&mut StdRng::seed_from_u64(5), None);
        let b = dist.rsample(&mut StdRng::seed_from_u64(5), None);
        let actions = to_vec(a.actions);
        assert!(actions.iter().all(|x| *x >= -1.0 && *x <= 1.0));
        assert_eq!(actions, to_vec(b.actions));
        assert!(to_vec(a.log_prob).iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_state_dependent_noise_is_held_fixed() {
        let device = Default::default();
        let mut rng = StdRng::seed_from_u64(9);
        let latent = standard_normal::<B, _, 2>([4, 5], &mut rng, &device);
        let dist = ActionDistribution::StateDependent {
            mean: Tensor::<B, 2>::zeros([4, 2], &device),
            log_std: Tensor::<B, 2>::zeros([5, 2], &device).add_scalar(-1.0),
            latent,
        };
        let noise = StateDependentNoise::sample(5, 2, &mut rng, &device);

        let first = dist.rsample(&mut rng, Some(&noise));
        let second = dist.rsample(&mut rng, Some(&noise));
        assert_eq!(to_vec(first.actions), to_vec(second.actions));
        assert!(to_vec(first.log_prob).iter().all(|l| l.is_finite()));
    }

    #[test]
    fn test_mode_is_tanh_of_mean() {
        let device = Default::default();
        let dist = ActionDistribution::Gaussian {
            mean: Tensor::<B, 2>::from_floats([[0.0, 10.0]], &device),
            log_std: Tensor::<B, 2>::zeros([1, 2], &device),
        };
        let mode = to_vec(dist.mode());
        assert!(mode[0].abs() < 1e-6);
        assert!((mode[1] - 1.0).abs() < 1e-4);
    }
}
