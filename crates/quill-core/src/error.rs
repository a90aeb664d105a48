//! Error types for registration and dispatch.

use std::sync::Arc;

use thiserror::Error;

use crate::channel::Channel;

/// Boxed error type used at the extension boundary.
///
/// Places, providers and registrants are written by independent contributors
/// and may fail for reasons the engine knows nothing about.
pub use tower::BoxError;

/// Returned by a place when the context does **not** match.
///
/// The dispatch engine recognises this error and silently skips the binding.
/// Every other error from a place is treated as a genuine failure.
#[derive(Debug, Clone, Copy, Error)]
#[error("context not matched by place")]
pub struct NoMatch;

/// Errors raised while building the registry. All of them abort bootstrap.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The priority is not an orderable number.
    #[error("invalid priority {priority} registered by '{registrant}' on channel '{channel}'")]
    InvalidPriority {
        registrant: Arc<str>,
        channel: Channel,
        priority: f64,
    },

    /// A placement was started but never finished with `with_provider`.
    #[error("placement on channel '{channel}' by '{registrant}' was never given a provider")]
    IncompletePlacement { registrant: Arc<str>, channel: Channel },

    /// A registrant extended a channel outside the set it declared.
    #[error("registrant '{registrant}' extended undeclared channel '{channel}'")]
    UndeclaredChannel { registrant: Arc<str>, channel: Channel },

    /// The registrant's own registration callback failed.
    #[error("registrant '{registrant}' failed to register providers: {source}")]
    Registrant {
        registrant: Arc<str>,
        #[source]
        source: BoxError,
    },
}

/// Errors that abort a single dispatch.
///
/// Results offered to the collector before the failure stay in the collector.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A place failed with something other than [`NoMatch`].
    #[error("place registered by '{registrant}' failed on channel '{channel}': {source}")]
    Predicate {
        channel: Channel,
        registrant: Arc<str>,
        #[source]
        source: BoxError,
    },

    /// A provider failed while producing results.
    #[error("provider '{provider}' registered by '{registrant}' failed on channel '{channel}': {source}")]
    Provider {
        channel: Channel,
        registrant: Arc<str>,
        provider: String,
        #[source]
        source: BoxError,
    },
}

impl DispatchError {
    /// Returns the channel the failed dispatch ran on.
    pub fn channel(&self) -> &Channel {
        match self {
            Self::Predicate { channel, .. } | Self::Provider { channel, .. } => channel,
        }
    }

    /// Returns the name of the registrant whose binding failed.
    pub fn registrant(&self) -> &str {
        match self {
            Self::Predicate { registrant, .. } | Self::Provider { registrant, .. } => registrant,
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
