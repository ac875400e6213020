//! Training algorithms.
//!
//! - `registry`: closed name-to-architecture mapping (`SAC`, `ActionSAC`)
//! - `sac`: Soft Actor-Critic and its factored-actor variant

pub mod registry;
pub mod sac;

pub use registry::Algorithm;
pub use sac::{PolicyConfig, Sac, SacConfig};
