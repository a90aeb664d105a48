//! The completion service: owner of the registry lifecycle.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quill_runtime::CompletionService;
//!
//! let service = CompletionService::builder()
//!     .config_file("quill.toml")
//!     .registrant(KeywordContributor)
//!     .registrant(SnippetContributor::new(index))
//!     .build()?;
//!
//! service.bootstrap()?;
//!
//! let completion = service.complete(&Channel::BASIC, &cursor).await?;
//! for item in completion.results {
//!     println!("{item}");
//! }
//! ```
//!
//! # Re-bootstrap
//!
//! [`bootstrap`](CompletionService::bootstrap) may be called again at any
//! time. It rebuilds the registry from scratch and publishes it atomically.
//! Dispatches already running keep the snapshot they started with.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use quill_core::{
    Channel, DispatchEngine, DispatchSummary, ProviderRegistry, QueryContext, Registrant,
    RegistryStats, RegistrySnapshot, ResultCollector,
};

use crate::config::{ConfigLoader, QuillConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The registry currently served, with what went into it.
struct Published<Q: ?Sized, R> {
    snapshot: Arc<RegistrySnapshot<Q, R>>,
    generation: u64,
    installed: Vec<String>,
    skipped: Vec<String>,
}

/// Bootstraps registrants and serves completion queries.
pub struct CompletionService<Q: ?Sized, R> {
    config: QuillConfig,
    registrants: Vec<Arc<dyn Registrant<Q, R>>>,
    published: RwLock<Option<Published<Q, R>>>,
}

impl<Q, R> CompletionService<Q, R>
where
    Q: QueryContext + ?Sized + 'static,
    R: Send + 'static,
{
    /// Creates a service builder.
    pub fn builder() -> CompletionServiceBuilder<Q, R> {
        CompletionServiceBuilder::new()
    }

    /// Creates a service from an already loaded configuration.
    pub fn from_config(
        config: QuillConfig,
        registrants: Vec<Arc<dyn Registrant<Q, R>>>,
    ) -> RuntimeResult<Self> {
        validate_config(&config)?;
        Ok(Self {
            config,
            registrants,
            published: RwLock::new(None),
        })
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &QuillConfig {
        &self.config
    }

    /// Builds the registry from every enabled registrant and publishes it.
    ///
    /// Registrants listed in `registrants.disabled` are skipped. Calling this
    /// again discards the previous registry entirely. On failure the
    /// previously published registry, if any, stays in use.
    pub fn bootstrap(&self) -> RuntimeResult<RegistryStats> {
        let mut enabled: Vec<&dyn Registrant<Q, R>> = Vec::with_capacity(self.registrants.len());
        let mut installed = Vec::new();
        let mut skipped = Vec::new();

        for registrant in &self.registrants {
            let name = registrant.name();
            if self.config.registrants.is_disabled(name) {
                warn!(registrant = name, "Registrant disabled by configuration, skipping");
                skipped.push(name.to_string());
            } else {
                installed.push(name.to_string());
                enabled.push(registrant.as_ref());
            }
        }

        let registry = ProviderRegistry::bootstrap(enabled).inspect_err(|e| {
            warn!(error = %e, "Bootstrap failed, keeping the current registry");
        })?;

        let snapshot = Arc::new(registry.freeze());
        let stats = snapshot.stats();

        let mut published = self.published.write();
        let generation = published.as_ref().map_or(1, |p| p.generation + 1);
        *published = Some(Published {
            snapshot,
            generation,
            installed,
            skipped,
        });
        drop(published);

        info!(generation, %stats, "Provider registry published");
        Ok(stats)
    }

    /// Returns `true` once a bootstrap has succeeded.
    pub fn is_bootstrapped(&self) -> bool {
        self.published.read().is_some()
    }

    /// Returns an engine over the currently published registry.
    pub fn engine(&self) -> RuntimeResult<DispatchEngine<Q, R>> {
        self.published
            .read()
            .as_ref()
            .map(|p| DispatchEngine::from_arc(Arc::clone(&p.snapshot)))
            .ok_or(RuntimeError::NotBootstrapped)
    }

    /// Returns a collector limited as configured for `channel`.
    pub fn collector(&self, channel: &Channel) -> ResultCollector<R> {
        ResultCollector::new().limit(self.config.dispatch.limit_for(channel))
    }

    /// Dispatches a query on `channel` with a collector from [`collector`](Self::collector).
    pub async fn complete(&self, channel: &Channel, ctx: &Q) -> RuntimeResult<Completion<R>> {
        let mut collector = self.collector(channel);
        let summary = self.complete_with(channel, ctx, &mut collector).await?;

        Ok(Completion {
            summary,
            rejected: collector.rejected(),
            results: collector.into_results(),
        })
    }

    /// Dispatches a query on `channel` into a caller-built collector.
    ///
    /// On a dispatch error the results offered so far stay in `collector`.
    pub async fn complete_with(
        &self,
        channel: &Channel,
        ctx: &Q,
        collector: &mut ResultCollector<R>,
    ) -> RuntimeResult<DispatchSummary> {
        if !self.config.dispatch.is_enabled(channel) {
            debug!(channel = %channel, "Channel disabled, refusing dispatch");
            return Err(RuntimeError::ChannelDisabled(channel.clone()));
        }

        let engine = self.engine()?;
        Ok(engine.dispatch(channel, ctx, collector).await?)
    }

    /// Returns statistics about the published registry.
    pub fn stats(&self) -> ServiceStats {
        let published = self.published.read();
        match published.as_ref() {
            Some(p) => ServiceStats {
                generation: p.generation,
                registrants: p.installed.clone(),
                skipped: p.skipped.clone(),
                bindings: p.snapshot.stats(),
            },
            None => ServiceStats::default(),
        }
    }
}

impl<Q: ?Sized, R> fmt::Debug for CompletionService<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let generation = self.published.read().as_ref().map(|p| p.generation);
        f.debug_struct("CompletionService")
            .field("registrants", &self.registrants.len())
            .field("generation", &generation)
            .finish_non_exhaustive()
    }
}

/// The outcome of [`CompletionService::complete`].
#[derive(Debug)]
pub struct Completion<R> {
    /// Results in the order they were offered.
    pub results: Vec<R>,
    pub summary: DispatchSummary,
    /// Offers discarded because the collector was saturated.
    pub rejected: usize,
}

/// Statistics about a [`CompletionService`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Number of successful bootstraps; `0` before the first.
    pub generation: u64,
    /// Registrants installed by the last bootstrap, in order.
    pub registrants: Vec<String>,
    /// Registrants skipped by configuration in the last bootstrap.
    pub skipped: Vec<String>,
    pub bindings: RegistryStats,
}

impl fmt::Display for ServiceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Generation {}: {} registrant(s), {} skipped, {}",
            self.generation,
            self.registrants.len(),
            self.skipped.len(),
            self.bindings
        )
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`CompletionService`].
pub struct CompletionServiceBuilder<Q: ?Sized, R> {
    config_loader: ConfigLoader,
    config: Option<QuillConfig>,
    registrants: Vec<Arc<dyn Registrant<Q, R>>>,
    init_logging: bool,
}

impl<Q, R> CompletionServiceBuilder<Q, R>
where
    Q: QueryContext + ?Sized + 'static,
    R: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            registrants: Vec::new(),
            init_logging: false,
        }
    }

    /// Uses `config` as is instead of loading configuration.
    pub fn config(mut self, config: QuillConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads configuration from this file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Adds a registrant. Registrants are bootstrapped in the order added.
    pub fn registrant<T>(self, registrant: T) -> Self
    where
        T: Registrant<Q, R> + 'static,
    {
        self.registrant_arc(Arc::new(registrant))
    }

    /// Adds a shared registrant.
    pub fn registrant_arc(mut self, registrant: Arc<dyn Registrant<Q, R>>) -> Self {
        self.registrants.push(registrant);
        self
    }

    /// Installs the global tracing subscriber from the loaded configuration.
    pub fn init_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    /// Loads configuration and builds the service. Does not bootstrap.
    pub fn build(self) -> RuntimeResult<CompletionService<Q, R>> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        debug!(
            registrants = self.registrants.len(),
            "Completion service built"
        );
        CompletionService::from_config(config, self.registrants)
    }
}

impl<Q, R> Default for CompletionServiceBuilder<Q, R>
where
    Q: QueryContext + ?Sized + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
