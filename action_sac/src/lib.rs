//! # ActionSAC: Soft Actor-Critic with Factored Action Heads
//!
//! SAC for continuous control where the actor can split its output into
//! semantic action groups (joints, gripper, pose). Each group has its own
//! head reading the observation directly; heads share no parameters. Plain
//! SAC instead runs one latent MLP followed by a linear mean head.
//!
//! ## Architecture Overview
//!
//! ```text
//!  ActionSAC:
//!          ┌─► head: arm  (Linear ─ ReLU ─ Linear ─ tanh)    ─┐
//!  obs ────┤                                                  ├─ concat ─► mean ─┐
//!          └─► head: grip (Linear ─ ReLU ─ Linear ─ sigmoid) ─┘                  │
//!                                                                                ▼
//!  SAC:                                                            ┌──────────────┐
//!  obs ──► latent Mlp ──► mu: Linear ──────────────────► mean ───► │ squashed     │──► action
//!                                                                  │ Gaussian/gSDE│
//!  log-std head (or gSDE matrix) reads the same latent ──────────► └──────────────┘
//!
//!  Sac::learn ── env step ─► ReplayBuffer ─► train(): critics, actor, entropy,
//!                                                     soft target update
//! ```
//!
//! The [`driver`] module wires agents into the two experiment workflows:
//! a single training run and a persistent hyperparameter [`search`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use action_sac::{Algorithm, Sac, SacConfig};
//!
//! let env = urgym::make("URGym/CubesGrasp-v0", urgym::RenderMode::None)?;
//! let layout = urgym::spec("URGym/CubesGrasp-v0")?.action_layout;
//! let policy = Algorithm::ActionSac.policy_config(layout, env.action_space().dim(), 256);
//! let mut sac = Sac::<B>::new(env, Algorithm::ActionSac, SacConfig::new(), policy, device)?;
//! sac.learn(100_000, &mut action_sac::callbacks::NoCallback)?;
//! sac.save("policies/model_ActionSAC_policy")?;
//! ```

pub mod algorithms;
pub mod callbacks;
pub mod checkpoint;
pub mod core;
pub mod driver;
pub mod error;
pub mod evaluation;
pub mod metrics;
pub mod nn;
pub mod search;

pub use algorithms::{Algorithm, PolicyConfig, Sac, SacConfig};
pub use callbacks::{Callback, CheckpointCallback, NoCallback};
pub use error::{Error, Result};
pub use evaluation::{evaluate_policy, EvalResult};
pub use nn::{ActionConfig, ActionGroup, FactoredActionNet};
pub use search::{Sampler, SearchSpace, Study, StudyStorage, TrialRecord, TrialState};
