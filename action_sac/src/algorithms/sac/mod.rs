//! Soft Actor-Critic with an optional factored actor.
//!
//! # Architecture
//!
//! ```text
//! Actor
//! ├── latent stage: Standard (MLP) | Factored (one head per action group)
//! ├── mean head (Standard only; identity for Factored)
//! └── log-std head, or a learned gSDE log-std matrix
//!
//! Critic ensemble (n_critics Q-networks on [obs, action])
//! └── target copy, Polyak-averaged
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use action_sac::algorithms::{Algorithm, sac::{Sac, SacConfig}};
//!
//! let env = urgym::make("URGym/CubesGrasp-v0", urgym::RenderMode::None)?;
//! let policy = Algorithm::ActionSac.policy_config(layout, 7, 256);
//! let mut sac = Sac::<MyBackend>::new(env, Algorithm::ActionSac, SacConfig::new(), policy, device)?;
//! sac.learn(10_000, &mut NoCallback)?;
//! sac.save("policies/model_ActionSAC_policy")?;
//! ```

mod actor;
mod buffer;
mod config;
mod critic;
mod distribution;
mod entropy;
mod losses;
mod policy;
#[allow(clippy::module_inception)]
mod sac;


pub use actor::{ActionStage, Actor};
pub use buffer::{ReplayBatch, ReplayBuffer};
pub use config::{EntCoef, NetArch, PolicyConfig, SacConfig};
pub use critic::Critic;
pub use distribution::{
    scale_action, squash_correction, unscale_action, ActionDistribution, SquashedSample,
    StateDependentNoise, LOG_STD_MAX, LOG_STD_MIN,
};
pub use entropy::EntropyTuner;
pub use losses::{actor_loss, critic_loss, td_targets};
pub use policy::SacPolicy;
pub use sac::{Sac, TrainStats};
