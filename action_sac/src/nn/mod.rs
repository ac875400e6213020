//! Network building blocks.
//!
//! - [`Mlp`]: activated linear stacks used by the actor latent path and the critics
//! - [`FactoredActionNet`]: per-group action heads over shared features
//! - [`init`]: seeded initialization so networks are reproducible per seed

pub mod activation;
pub mod factored;
pub mod init;
pub mod mlp;

pub use activation::Activation;
pub use factored::{ActionConfig, ActionGroup, FactoredActionNet, GroupHead};
pub use mlp::{Mlp, MlpConfig};
