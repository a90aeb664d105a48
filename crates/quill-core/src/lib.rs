//! # Quill Core
//!
//! The registration-and-dispatch engine behind the Quill completion framework.
//!
//! External contributors ([`Registrant`]s) attach *providers* to *places*
//! (predicates over a query context) at a *priority*, partitioned into
//! independent [`Channel`]s. At query time the [`DispatchEngine`] walks the
//! channel's bindings from the highest priority down, evaluates each place and
//! hands matching providers a shared [`ResultCollector`].
//!
//! ```text
//! ┌─────────────┐  bootstrap  ┌──────────────────┐  freeze  ┌──────────────────┐
//! │ Registrants │────────────▶│ ProviderRegistry │─────────▶│ RegistrySnapshot │
//! └─────────────┘             └──────────────────┘          └────────┬─────────┘
//!                                                                    │ Arc
//!                    ┌───────────────┐  offer   ┌────────────────┐   │
//!                    │ResultCollector│◀─────────│ DispatchEngine │◀──┘
//!                    └───────────────┘          └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_core::{Channel, DispatchEngine, ProviderRegistry, ResultCollector};
//! use quill_core::{always, provider_fn};
//!
//! let mut registry = ProviderRegistry::<Cursor, String>::new();
//! registry.register(
//!     Channel::BASIC,
//!     10.0,
//!     always(),
//!     provider_fn(|_ctx: &Cursor, _bindings, out: &mut ResultCollector<String>| {
//!         out.offer("println!".to_string());
//!         Ok(())
//!     }),
//! )?;
//!
//! let engine = DispatchEngine::new(registry.freeze());
//! let mut collector = ResultCollector::with_limit(50);
//! engine.dispatch(&Channel::BASIC, &cursor, &mut collector).await?;
//! ```

pub mod bindings;
pub mod channel;
pub mod collector;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod place;
pub mod provider;
pub mod registrar;
pub mod registry;
pub mod service;

pub use bindings::{BindingKey, MatchBindings};
pub use channel::Channel;
pub use collector::ResultCollector;
pub use context::QueryContext;
pub use dispatcher::{DispatchEngine, DispatchSummary, StopReason};
pub use error::{BoxError, DispatchError, DispatchResult, NoMatch, RegistrationError};
pub use place::{Place, PlaceExt, always, never, place_fn, try_place_fn};
pub use provider::{Provider, ProviderFn, provider_fn};
pub use registrar::{Placement, Registrant, Registrar};
pub use registry::{Binding, ProviderRegistry, RegistryStats, RegistrySnapshot};
pub use service::{ChannelService, Query, QueryOutcome};

// Re-exported so downstream crates can name the cancellation signal without
// depending on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
