//! Actor, critic ensemble and target critic as one persistable module.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::Rng;

use super::actor::Actor;
use super::config::PolicyConfig;
use super::critic::Critic;
use super::distribution::StateDependentNoise;
use crate::error::Result;

#[derive(Module, Debug)]
pub struct SacPolicy<B: Backend> {
    pub actor: Actor<B>,
    pub critic: Critic<B>,
    pub critic_target: Critic<B>,
}

impl<B: Backend> SacPolicy<B> {
    /// Build all networks. The target critic starts as an exact copy.
    pub fn new<R: Rng + ?Sized>(
        config: &PolicyConfig,
        obs_dim: usize,
        action_dim: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> Result<Self> {
        let actor = Actor::new(config, obs_dim, action_dim, rng, device)?;
        let critic = Critic::new(
            obs_dim,
            action_dim,
            &config.net_arch.qf,
            config.activation,
            config.n_critics,
            rng,
            device,
        );
        let critic_target = critic.clone();
        Ok(Self {
            actor,
            critic,
            critic_target,
        })
    }

    /// Actions in `[-1, 1]` for `[batch, obs_dim]` observations.
    pub fn act<R: Rng + ?Sized>(
        &self,
        obs: Tensor<B, 2>,
        deterministic: bool,
        rng: &mut R,
        sde_noise: Option<&StateDependentNoise<B>>,
    ) -> Tensor<B, 2> {
        let dist = self.actor.forward(obs);
        if deterministic {
            dist.mode()
        } else {
            dist.rsample(rng, sde_noise).actions
        }
    }
}
