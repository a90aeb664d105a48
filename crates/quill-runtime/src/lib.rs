//! Quill Runtime: configuration, logging and the registry lifecycle.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `QuillConfig`)
//! - Logging setup (`LoggingBuilder`, `SpanEvents`)
//! - The [`CompletionService`], which bootstraps registrants, publishes the
//!   frozen registry and serves completion queries against it
//!
//! ```rust,ignore
//! use quill_runtime::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = CompletionService::builder()
//!         .init_logging()
//!         .registrant(Keywords)
//!         .build()?;
//!     service.bootstrap()?;
//!
//!     let completion = service.complete(&Channel::BASIC, &cursor).await?;
//!     info!(count = completion.results.len(), "Completed");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod service;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, QuillConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use service::{Completion, CompletionService, CompletionServiceBuilder, ServiceStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Completion, CompletionService, QuillConfig, RuntimeError, RuntimeResult};
    pub use quill_core::{
        BoxError, Channel, MatchBindings, QueryContext, Registrant, Registrar, ResultCollector,
    };
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
