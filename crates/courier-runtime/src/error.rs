//! Runtime error types.

use thiserror::Error;

use courier_framework::{ApiError, DispatchError};
use courier_transport::TransportError;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be created.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A handler registration was rejected.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// `getMe` failed, so the bot never started polling.
    #[error("getMe failed: {0}")]
    Startup(#[source] ApiError),

    #[error("Runtime is already running")]
    AlreadyRunning,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
