//! Runtime error types.

use thiserror::Error;

use quill_core::{Channel, DispatchError, RegistrationError};

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bootstrap failed; the previously published registry stays in use.
    #[error("Bootstrap failed: {0}")]
    Registration(#[from] RegistrationError),

    /// A dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Completion was requested before the first successful bootstrap.
    #[error("Completion service has not been bootstrapped")]
    NotBootstrapped,

    /// The channel is disabled by configuration.
    #[error("Channel '{0}' is disabled")]
    ChannelDisabled(Channel),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
