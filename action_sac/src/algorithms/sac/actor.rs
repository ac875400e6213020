//! SAC actor.
//!
//! The actor maps observations to a squashed Gaussian over actions in three
//! stages: a latent stage, a mean head and a log-std head. The latent stage is
//! pluggable: a plain [`Mlp`] or a [`FactoredActionNet`] whose per-group
//! outputs are used directly as the mean.

use burn::module::{Module, Param};
use burn::nn::Linear;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;

use super::config::PolicyConfig;
use super::distribution::{ActionDistribution, LOG_STD_MAX, LOG_STD_MIN};
use crate::error::Result;
use crate::nn::init::seeded_linear;
use crate::nn::{FactoredActionNet, Mlp, MlpConfig};

// ============================================================================
// Latent Stage
// ============================================================================

/// Stage producing the actor's latent features.
#[derive(Module, Debug)]
pub enum ActionStage<B: Backend> {
    /// Activated MLP over the observation.
    Standard(Mlp<B>),
    /// One independent head per action group.
    Factored(FactoredActionNet<B>),
}

impl<B: Backend> ActionStage<B> {
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            ActionStage::Standard(mlp) => mlp.forward(features),
            ActionStage::Factored(net) => net.forward(features),
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            ActionStage::Standard(mlp) => mlp.output_dim(),
            ActionStage::Factored(net) => net.output_dim(),
        }
    }

    pub fn is_factored(&self) -> bool {
        matches!(self, ActionStage::Factored(_))
    }
}

// ============================================================================
// Actor
// ============================================================================

#[derive(Module, Debug)]
pub struct Actor<B: Backend> {
    latent_pi: ActionStage<B>,
    /// Mean head. Absent for the factored stage, whose output is the mean.
    mu: Option<Linear<B>>,
    /// Per-sample log-std head (diagonal Gaussian).
    log_std_head: Option<Linear<B>>,
    /// Learned `[latent, action]` log-std matrix (gSDE).
    sde_log_std: Option<Param<Tensor<B, 2>>>,
    #[module(skip)]
    clip_mean: f32,
    #[module(skip)]
    action_dim: usize,
}

impl<B: Backend> Actor<B> {
    pub fn new<R: Rng + ?Sized>(
        config: &PolicyConfig,
        obs_dim: usize,
        action_dim: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate(action_dim)?;

        let (latent_pi, mu) = match &config.action_config {
            Some(action_config) => {
                let net = FactoredActionNet::new(obs_dim, action_config, rng, device)?;
                (ActionStage::Factored(net), None)
            }
            None => {
                let mlp = MlpConfig::new(obs_dim, config.net_arch.pi.clone())
                    .with_activation(config.activation)
                    .init(rng, device);
                let mu = seeded_linear(mlp.output_dim(), action_dim, rng, device);
                (ActionStage::Standard(mlp), Some(mu))
            }
        };
        let latent_dim = latent_pi.output_dim();

        let (log_std_head, sde_log_std) = if config.use_sde {
            let init = Tensor::<B, 2>::ones([latent_dim, action_dim], device)
                .mul_scalar(config.log_std_init);
            (None, Some(Param::from_tensor(init)))
        } else {
            (Some(seeded_linear(latent_dim, action_dim, rng, device)), None)
        };

        Ok(Self {
            latent_pi,
            mu,
            log_std_head,
            sde_log_std,
            clip_mean: config.clip_mean,
            action_dim,
        })
    }

    /// Action distribution for a batch of observations `[batch, obs_dim]`.
    pub fn forward(&self, obs: Tensor<B, 2>) -> ActionDistribution<B> {
        let latent = self.latent_pi.forward(obs);
        let mean = match &self.mu {
            Some(mu) => mu.forward(latent.clone()),
            None => latent.clone(),
        };

        if let Some(log_std) = &self.sde_log_std {
            let mean = if self.mu.is_some() && self.clip_mean > 0.0 {
                mean.clamp(-self.clip_mean, self.clip_mean)
            } else {
                mean
            };
            return ActionDistribution::StateDependent {
                mean,
                log_std: log_std.val(),
                latent,
            };
        }

        let log_std = match &self.log_std_head {
            Some(head) => head.forward(latent).clamp(LOG_STD_MIN, LOG_STD_MAX),
            None => mean.zeros_like(),
        };
        ActionDistribution::Gaussian { mean, log_std }
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_pi.output_dim()
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    pub fn uses_sde(&self) -> bool {
        self.sde_log_std.is_some()
    }

    pub fn stage(&self) -> &ActionStage<B> {
        &self.latent_pi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::nn::{ActionConfig, ActionGroup, Activation};
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type B = NdArray<f32>;

    fn factored_config() -> PolicyConfig {
        let action = ActionConfig::new(
            32,
            vec![ActionGroup::new(6, Activation::Tanh), ActionGroup::new(1, Activation::Sigmoid)],
        );
        PolicyConfig::factored(action, 7, vec![32, 32])
    }

    #[test]
    fn test_standard_actor_shapes() {
        let device = Default::default();
        let config = PolicyConfig::new().with_net_arch(super::super::config::NetArch::shared(vec![16, 16]));
        let actor: Actor<B> = Actor::new(&config, 5, 2, &mut StdRng::seed_from_u64(0), &device).unwrap();
        assert!(!actor.stage().is_factored());
        assert_eq!(actor.latent_dim(), 16);

        match actor.forward(Tensor::zeros([3, 5], &device)) {
            ActionDistribution::Gaussian { mean, log_std } => {
                assert_eq!(mean.dims(), [3, 2]);
                assert_eq!(log_std.dims(), [3, 2]);
            }
            other => panic!("unexpected distribution {other:?}"),
        }
    }

    #[test]
    fn test_factored_actor_mean_is_stage_output() {
        let device = Default::default();
        let actor: Actor<B> =
            Actor::new(&factored_config(), 19, 7, &mut StdRng::seed_from_u64(1), &device).unwrap();
        assert!(actor.stage().is_factored());
        assert_eq!(actor.latent_dim(), 7);
        // Every head reads the raw observation
        match actor.stage() {
            ActionStage::Factored(net) => {
                assert_eq!(net.feature_dim(), 19);
                for head in net.heads() {
                    assert_eq!(head.hidden_layer().weight.dims(), [19, 32]);
                }
            }
            ActionStage::Standard(_) => unreachable!(),
        }

        let obs = Tensor::<B, 2>::ones([2, 19], &device);
        let dist = actor.forward(obs.clone());
        let direct = actor.stage().forward(obs);
        assert_eq!(dist.mean().clone().into_data(), direct.into_data());

        // Sigmoid group keeps the gripper mean in (0, 1)
        let mean = dist.mean().clone().into_data().to_vec::<f32>().unwrap();
        assert!(mean.chunks(7).all(|row| row[6] > 0.0 && row[6] < 1.0));
    }

    #[test]
    fn test_factored_width_mismatch_fails_fast() {
        let device = Default::default();
        let result: Result<Actor<B>> =
            Actor::new(&factored_config(), 17, 8, &mut StdRng::seed_from_u64(1), &device);
        assert!(matches!(result, Err(Error::ActionDimMismatch { expected: 8, got: 7 })));
    }

    #[test]
    fn test_sde_actor_log_std_matrix() {
        let device = Default::default();
        let config = factored_config().with_use_sde(true);
        let actor: Actor<B> = Actor::new(&config, 19, 7, &mut StdRng::seed_from_u64(2), &device).unwrap();
        assert!(actor.uses_sde());

        match actor.forward(Tensor::zeros([4, 19], &device)) {
            ActionDistribution::StateDependent { log_std, latent, .. } => {
                assert_eq!(log_std.dims(), [7, 7]);
                assert_eq!(latent.dims(), [4, 7]);
                let values = log_std.into_data().to_vec::<f32>().unwrap();
                assert!(values.iter().all(|v| (*v + 3.0).abs() < 1e-6));
            }
            other => panic!("unexpected distribution {other:?}"),
        }
    }
}
