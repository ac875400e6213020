//! Environment error types.

use std::io;

/// Errors raised by environment construction, stepping and rendering.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// The requested id is not in the registry.
    #[error("unknown environment id '{id}' (registered: {registered})")]
    UnknownEnv { id: String, registered: String },

    /// An action did not match the action space dimensionality.
    #[error("action has {got} components, action space expects {expected}")]
    ActionShape { expected: usize, got: usize },

    /// An action contained NaN or infinite components.
    #[error("action contains non-finite values")]
    NonFiniteAction,

    /// `step` was called before the first `reset`.
    #[error("step called before reset")]
    NeedsReset,

    /// Rendering was requested but is not available in this build.
    #[error("rendering unavailable: {0}")]
    RenderUnavailable(String),

    /// Drawing or encoding a frame failed.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error (video files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for environment operations.
pub type EnvResult<T> = Result<T, EnvError>;
