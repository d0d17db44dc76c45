//! Fatal setup errors (renderer-agnostic).

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong before the first frame. None of these are
/// recoverable: the caller logs the error and terminates.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("window/context initialization failed: {0}")]
    Context(String),

    #[error("shader program build failed: {0}")]
    Shader(String),

    #[error("failed to load model {}: {reason}", .path.display())]
    Model { path: PathBuf, reason: String },

    #[error("failed to load texture {}: {reason}", .path.display())]
    Texture { path: PathBuf, reason: String },

    #[error("event loop error: {0}")]
    EventLoop(String),
}

pub type SetupResult<T> = Result<T, SetupError>;
