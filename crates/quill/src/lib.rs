//! # Quill
//!
//! Prioritized, channel-partitioned dispatch of completion providers.
//!
//! ## Overview
//!
//! Independent contributors register *providers* at *places* (predicates over
//! the query context) with a numeric *priority*, on one of several *channels*
//! (basic, smart, class-name, or any channel of your own). A query walks its
//! channel from the highest priority down, runs every provider whose place
//! matches, and stops as soon as the caller's result collector is saturated.
//!
//! ```text
//! ┌─────────────┐ bootstrap ┌───────────────────┐ engine() ┌────────────────┐
//! │ Registrants │──────────▶│ CompletionService │─────────▶│ DispatchEngine │──▶ providers
//! └─────────────┘           └───────────────────┘          └────────────────┘
//! ```
//!
//! - **Core** ([`core`]): registry, places, providers, collector, dispatch engine
//! - **Runtime** ([`runtime`]): configuration, logging, `CompletionService`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quill::prelude::*;
//!
//! struct Keywords;
//!
//! impl Registrant<Cursor, String> for Keywords {
//!     fn name(&self) -> &str {
//!         "keywords"
//!     }
//!
//!     fn register_providers(&self, r: &mut Registrar<'_, Cursor, String>) -> Result<(), BoxError> {
//!         r.extend_basic(always())
//!             .at_priority(10.0)
//!             .with_provider(provider_fn(|ctx: &Cursor, _: &MatchBindings, out: &mut ResultCollector<String>| {
//!                 out.offer_all(KEYWORDS.iter().filter(|k| k.starts_with(ctx.prefix())).map(|k| k.to_string()));
//!                 Ok(())
//!             }));
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = CompletionService::builder().registrant(Keywords).build()?;
//!     service.bootstrap()?;
//!
//!     let completion = service.complete(&Channel::BASIC, &cursor).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use quill_core as core;
pub use quill_runtime as runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use quill_runtime::{
        Completion, CompletionService, ConfigLoader, LoggingBuilder, QuillConfig, RuntimeError,
        RuntimeResult, ServiceStats,
    };

    // Registration
    pub use quill_core::{
        BindingKey, Channel, MatchBindings, Place, PlaceExt, Provider, QueryContext, Registrant,
        Registrar, always, never, place_fn, provider_fn, try_place_fn,
    };

    // Dispatch
    pub use quill_core::{
        BoxError, CancellationToken, DispatchEngine, DispatchError, DispatchSummary, NoMatch,
        ResultCollector, StopReason,
    };

    // Logging macros
    pub use quill_runtime::tracing::{debug, error, info, trace, warn};
}
