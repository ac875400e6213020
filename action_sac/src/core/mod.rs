//! Core training utilities shared across algorithms.

pub mod target_network;

pub use target_network::{soft_update, TargetNetworkManager};
