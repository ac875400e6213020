//! Error type shared by every layer of the crate.

use std::io;

use thiserror::Error;
use urgym::EnvError;

/// Result alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Action-group widths do not add up to the environment's action dimension.
    #[error("action groups cover {got} dimensions but the action space has {expected}")]
    ActionDimMismatch { expected: usize, got: usize },

    #[error("unknown algorithm '{name}', expected one of: {allowed}")]
    UnknownAlgorithm { name: String, allowed: String },

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure inside the burn record machinery.
    #[error("recorder error: {0}")]
    Recorder(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A loss or parameter became NaN or infinite.
    #[error("training diverged: non-finite {what} at step {step}")]
    Divergence { what: &'static str, step: usize },

    #[error("study '{0}' not found")]
    StudyNotFound(String),

    #[error("study '{0}' has no completed trials")]
    NoCompletedTrials(String),

    #[error("replay buffer holds {have} transitions, {need} needed")]
    EmptyBuffer { have: usize, need: usize },

    #[error("plot error: {0}")]
    Plot(String),

    /// A trial panicked; the payload message is kept.
    #[error("trial panicked: {0}")]
    TrialPanic(String),
}

impl Error {
    /// Whether this error stems from numerical instability during training.
    pub fn is_divergence(&self) -> bool {
        matches!(self, Error::Divergence { .. })
    }
}
