//! The dispatch engine.
//!
//! A [`DispatchEngine`] serves queries against a frozen [`RegistrySnapshot`].
//! For one `(channel, context, collector)` it walks the channel's bindings in
//! priority order:
//!
//! 1. Stop if the collector is cancelled or saturated.
//! 2. Evaluate the place with a fresh [`MatchBindings`]. A declined match
//!    skips the binding, a failing place aborts the dispatch.
//! 3. Await the provider with the bindings the place recorded.
//!
//! ```rust,ignore
//! let engine = DispatchEngine::new(registry.freeze());
//!
//! let mut collector = ResultCollector::with_limit(100);
//! let summary = engine.dispatch(&Channel::SMART, &cursor, &mut collector).await?;
//! debug!(?summary, "Completion finished");
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{Instrument, Level, debug, span, trace};

use crate::bindings::MatchBindings;
use crate::channel::Channel;
use crate::collector::ResultCollector;
use crate::context::QueryContext;
use crate::error::{DispatchError, NoMatch};
use crate::registry::{Binding, RegistrySnapshot};
use crate::service::ChannelService;

/// Why a dispatch stopped walking its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// Every binding of the channel was considered and the collector still
    /// accepts results.
    Exhausted,
    /// The collector saturated.
    Saturated,
    /// The caller's cancellation signal fired.
    Cancelled,
}

impl StopReason {
    /// Returns the reason a collector is refusing further work, if any.
    fn of<R>(collector: &ResultCollector<R>) -> Option<Self> {
        if collector.is_cancelled() {
            Some(Self::Cancelled)
        } else if collector.is_saturated() {
            Some(Self::Saturated)
        } else {
            None
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exhausted => "exhausted",
            Self::Saturated => "saturated",
            Self::Cancelled => "cancelled",
        })
    }
}

/// What a finished dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    /// The channel that was dispatched.
    pub channel: Channel,
    /// Number of places evaluated.
    pub evaluated: usize,
    /// Number of providers invoked.
    pub invoked: usize,
    /// Why the dispatch stopped.
    pub stop: StopReason,
}

impl DispatchSummary {
    fn start(channel: &Channel) -> Self {
        Self {
            channel: channel.clone(),
            evaluated: 0,
            invoked: 0,
            stop: StopReason::Exhausted,
        }
    }

    /// Returns `true` if the collector ended saturated or cancelled.
    pub fn short_circuited(&self) -> bool {
        self.stop != StopReason::Exhausted
    }
}

/// Serves queries against an immutable registry snapshot.
///
/// Cloning is cheap: clones share the snapshot.
pub struct DispatchEngine<Q: ?Sized, R> {
    snapshot: Arc<RegistrySnapshot<Q, R>>,
}

impl<Q: ?Sized, R> Clone for DispatchEngine<Q, R> {
    fn clone(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

impl<Q, R> DispatchEngine<Q, R>
where
    Q: QueryContext + ?Sized,
    R: Send + 'static,
{
    /// Creates an engine that owns `snapshot`.
    pub fn new(snapshot: RegistrySnapshot<Q, R>) -> Self {
        Self::from_arc(Arc::new(snapshot))
    }

    /// Creates an engine over a shared snapshot.
    pub fn from_arc(snapshot: Arc<RegistrySnapshot<Q, R>>) -> Self {
        Self { snapshot }
    }

    /// Returns the snapshot this engine dispatches against.
    pub fn snapshot(&self) -> &Arc<RegistrySnapshot<Q, R>> {
        &self.snapshot
    }

    /// Returns the channels that have at least one binding.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.snapshot.channels()
    }

    /// Returns a tower service dispatching on `channel`.
    pub fn service(&self, channel: Channel) -> ChannelService<Q, R> {
        ChannelService::new(self.clone(), channel)
    }

    /// Dispatches a query on `channel`, feeding `collector`.
    ///
    /// Providers run strictly one after another in non-increasing priority
    /// order. On error, results offered before the failure stay in
    /// `collector`.
    pub async fn dispatch(
        &self,
        channel: &Channel,
        ctx: &Q,
        collector: &mut ResultCollector<R>,
    ) -> Result<DispatchSummary, DispatchError> {
        let span = span!(Level::DEBUG, "dispatch", channel = %channel);
        self.walk(channel, ctx, collector).instrument(span).await
    }

    async fn walk(
        &self,
        channel: &Channel,
        ctx: &Q,
        collector: &mut ResultCollector<R>,
    ) -> Result<DispatchSummary, DispatchError> {
        let bindings = self.snapshot.bindings_for(channel);
        let mut summary = DispatchSummary::start(channel);

        if bindings.is_empty() {
            trace!("No bindings on channel");
            return Ok(summary);
        }

        for binding in bindings {
            if let Some(stop) = StopReason::of(collector) {
                debug!(
                    stop = %stop,
                    priority = binding.priority(),
                    collected = collector.len(),
                    "Stopping dispatch"
                );
                summary.stop = stop;
                break;
            }

            summary.evaluated += 1;
            let mut mb = MatchBindings::new();
            if !evaluate(binding, channel, ctx, &mut mb)? {
                trace!(
                    registrant = binding.registrant(),
                    priority = binding.priority(),
                    "Place declined, skipping"
                );
                continue;
            }

            trace!(
                registrant = binding.registrant(),
                provider = binding.provider_name(),
                priority = binding.priority(),
                bindings = mb.len(),
                "Place matched, invoking provider"
            );
            summary.invoked += 1;

            if let Err(source) = binding.provider().provide(ctx, &mb, collector).await {
                debug!(
                    registrant = binding.registrant(),
                    provider = binding.provider_name(),
                    error = %source,
                    "Provider failed"
                );
                return Err(DispatchError::Provider {
                    channel: channel.clone(),
                    registrant: Arc::clone(binding.registrant_arc()),
                    provider: binding.provider_name().to_string(),
                    source,
                });
            }
        }

        // The last provider may have filled or cancelled the collector.
        if summary.stop == StopReason::Exhausted {
            if let Some(stop) = StopReason::of(collector) {
                summary.stop = stop;
            }
        }

        debug!(
            evaluated = summary.evaluated,
            invoked = summary.invoked,
            collected = collector.len(),
            stop = %summary.stop,
            "Dispatch finished"
        );
        Ok(summary)
    }
}

/// Runs a binding's place, folding [`NoMatch`] into a decline.
fn evaluate<Q: ?Sized, R>(
    binding: &Binding<Q, R>,
    channel: &Channel,
    ctx: &Q,
    mb: &mut MatchBindings,
) -> Result<bool, DispatchError> {
    match binding.place().matches(ctx, mb) {
        Ok(accepted) => Ok(accepted),
        Err(e) if e.is::<NoMatch>() => Ok(false),
        Err(source) => Err(DispatchError::Predicate {
            channel: channel.clone(),
            registrant: Arc::clone(binding.registrant_arc()),
            source,
        }),
    }
}

impl<Q: ?Sized, R> fmt::Debug for DispatchEngine<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("snapshot", &self.snapshot)
            .finish()
    }
}


#[cfg(test)]
mod end_to_end {
    use std::sync::{Arc, Mutex};

    use crate::bindings::{BindingKey, MatchBindings};
    use crate::channel::Channel;
    use crate::collector::ResultCollector;
    use crate::context::QueryContext;
    use crate::dispatcher::{DispatchEngine, StopReason};
    use crate::error::{BoxError, NoMatch};
    use crate::place::{always, never, place_fn, try_place_fn};
    use crate::provider::{Provider, provider_fn};
    use crate::registrar::{Registrant, Registrar};
    use crate::registry::{Binding, ProviderRegistry};
    use tokio_util::sync::CancellationToken;

    /// A cursor in a line of text.
    struct Cursor {
        line: &'static str,
        offset: usize,
    }

    impl Cursor {
        fn at_end(line: &'static str) -> Self {
            Self {
                line,
                offset: line.len(),
            }
        }

        fn prefix(&self) -> &str {
            let start = self.line[..self.offset]
                .rfind(|c: char| !c.is_alphanumeric())
                .map_or(0, |i| i + 1);
            &self.line[start..self.offset]
        }
    }

    impl QueryContext for Cursor {
        type Position = usize;

        fn position(&self) -> &usize {
            &self.offset
        }
    }

    type Log = Arc<Mutex<Vec<&'static str>>>;

    /// A provider that records its invocation and offers `value`.
    fn recording(
        log: &Log,
        value: &'static str,
    ) -> impl Provider<Cursor, String> + use<> {
        let log = Arc::clone(log);
        provider_fn(
            move |_: &Cursor, _: &MatchBindings, out: &mut ResultCollector<String>| {
                log.lock().map_err(|e| e.to_string())?.push(value);
                out.offer(value.to_string());
                Ok(())
            },
        )
        .named(value)
    }

    fn invoked(log: &Log) -> Vec<&'static str> {
        log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    // ─── Ordering ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn providers_run_in_non_increasing_priority_with_stable_ties() -> Result<(), BoxError> {
        let log = Log::default();
        let mut registry = ProviderRegistry::new();
        registry.register(Channel::BASIC, 1.0, always(), recording(&log, "low"))?;
        registry.register(Channel::BASIC, 5.0, always(), recording(&log, "tie-1"))?;
        registry.register(Channel::BASIC, 9.0, always(), recording(&log, "high"))?;
        registry.register(Channel::BASIC, 5.0, always(), recording(&log, "tie-2"))?;
        registry.register(Channel::BASIC, f64::NEG_INFINITY, always(), recording(&log, "last"))?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector = ResultCollector::new();
        engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("x"), &mut collector)
            .await?;

        assert_eq!(invoked(&log), ["high", "tie-1", "tie-2", "low", "last"]);
        assert_eq!(collector.results(), ["high", "tie-1", "tie-2", "low", "last"]);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_views_are_identical() -> Result<(), BoxError> {
        let log = Log::default();
        let mut registry = ProviderRegistry::new();
        for (priority, name) in [(2.0, "a"), (2.0, "b"), (3.0, "c"), (-1.0, "d")] {
            registry.register(Channel::SMART, priority, always(), recording(&log, name))?;
        }

        let names = |bindings: Vec<&Binding<Cursor, String>>| -> Vec<String> {
            bindings.iter().map(|b| b.provider_name().to_string()).collect()
        };
        let first = names(registry.bindings_for(&Channel::SMART));
        let second = names(registry.bindings_for(&Channel::SMART));
        assert_eq!(first, second);
        assert_eq!(first, ["c", "a", "b", "d"]);
        Ok(())
    }

    // ─── Matching ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn provider_behind_non_matching_place_is_never_invoked() -> Result<(), BoxError> {
        let log = Log::default();
        let mut registry = ProviderRegistry::new();
        registry.register(Channel::BASIC, 10.0, never(), recording(&log, "hidden"))?;
        registry.register(
            Channel::BASIC,
            8.0,
            try_place_fn(|_: &Cursor, _: &mut MatchBindings| Err(NoMatch.into())),
            recording(&log, "refused"),
        )?;
        registry.register(Channel::BASIC, 1.0, always(), recording(&log, "visible"))?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector = ResultCollector::new();
        let summary = engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("x"), &mut collector)
            .await?;

        assert_eq!(invoked(&log), ["visible"]);
        assert_eq!(summary.evaluated, 3);
        assert_eq!(summary.invoked, 1);
        Ok(())
    }

    #[tokio::test]
    async fn provider_observes_bindings_recorded_by_its_place() -> Result<(), BoxError> {
        const MATCHED_PREFIX: BindingKey<String> = BindingKey::new("matchedPrefix");

        let mut registry = ProviderRegistry::new();
        registry.register(
            Channel::BASIC,
            0.0,
            place_fn(|ctx: &Cursor, mb: &mut MatchBindings| {
                mb.insert(&MATCHED_PREFIX, ctx.prefix().to_string());
                true
            }),
            provider_fn(
                |_: &Cursor, mb: &MatchBindings, out: &mut ResultCollector<String>| {
                    let prefix = mb.get(&MATCHED_PREFIX).ok_or("prefix not bound")?;
                    out.offer(format!("{prefix}bar"));
                    Ok(())
                },
            ),
        )?;
        registry.register(
            Channel::BASIC,
            -1.0,
            always(),
            provider_fn(
                |_: &Cursor, mb: &MatchBindings, out: &mut ResultCollector<String>| {
                    // Every place starts from empty bindings.
                    if mb.is_empty() {
                        out.offer("fresh".to_string());
                    }
                    Ok(())
                },
            ),
        )?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector = ResultCollector::new();
        engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("let foo"), &mut collector)
            .await?;

        assert_eq!(collector.results(), ["foobar", "fresh"]);
        Ok(())
    }

    #[tokio::test]
    async fn channels_do_not_see_each_other() -> Result<(), BoxError> {
        let log = Log::default();
        let mut registry = ProviderRegistry::new();
        registry.register(Channel::BASIC, 1.0, always(), recording(&log, "basic"))?;
        registry.register(Channel::CLASS_NAME, 1.0, always(), recording(&log, "class"))?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector = ResultCollector::new();
        engine
            .dispatch(&Channel::CLASS_NAME, &Cursor::at_end("Str"), &mut collector)
            .await?;

        assert_eq!(invoked(&log), ["class"]);
        Ok(())
    }

    // ─── Saturation ─────────────────────────────────────────────────────────────

    async fn two_providers(limit: usize) -> Result<(Vec<String>, Vec<&'static str>), BoxError> {
        let log = Log::default();
        let mut registry = ProviderRegistry::new();
        registry.register(Channel::BASIC, 10.0, always(), recording(&log, "a"))?;
        registry.register(Channel::BASIC, 5.0, always(), recording(&log, "b"))?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector = ResultCollector::with_limit(limit);
        engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("x"), &mut collector)
            .await?;
        Ok((collector.into_results(), invoked(&log)))
    }

    #[tokio::test]
    async fn roomy_collector_gathers_every_provider() -> Result<(), BoxError> {
        let (results, invoked) = two_providers(10).await?;
        assert_eq!(results, ["a", "b"]);
        assert_eq!(invoked, ["a", "b"]);
        Ok(())
    }

    #[tokio::test]
    async fn saturated_collector_skips_lower_priorities() -> Result<(), BoxError> {
        let (results, invoked) = two_providers(1).await?;
        assert_eq!(results, ["a"]);
        assert_eq!(invoked, ["a"]);
        Ok(())
    }

    #[tokio::test]
    async fn stop_condition_short_circuits() -> Result<(), BoxError> {
        let log = Log::default();
        let mut registry = ProviderRegistry::new();
        registry.register(Channel::SMART, 3.0, always(), recording(&log, "near"))?;
        registry.register(Channel::SMART, 2.0, always(), recording(&log, "exact"))?;
        registry.register(Channel::SMART, 1.0, always(), recording(&log, "far"))?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector =
            ResultCollector::new().stop_when(|results: &[String]| results.iter().any(|r| r == "exact"));
        let summary = engine
            .dispatch(&Channel::SMART, &Cursor::at_end("x"), &mut collector)
            .await?;

        assert_eq!(summary.stop, StopReason::Saturated);
        assert_eq!(invoked(&log), ["near", "exact"]);
        Ok(())
    }

    #[tokio::test]
    async fn empty_channel_invokes_nothing() -> Result<(), BoxError> {
        let engine = DispatchEngine::new(ProviderRegistry::<Cursor, String>::new().freeze());
        let mut collector = ResultCollector::new();
        let summary = engine
            .dispatch(&Channel::SMART, &Cursor::at_end("x"), &mut collector)
            .await?;

        assert_eq!(summary.invoked, 0);
        assert_eq!(summary.stop, StopReason::Exhausted);
        assert!(collector.is_empty());
        Ok(())
    }

    // ─── Cancellation and failure ───────────────────────────────────────────────

    #[tokio::test]
    async fn provider_can_cancel_the_rest_of_the_dispatch() -> Result<(), BoxError> {
        let log = Log::default();
        let token = CancellationToken::new();
        let trigger = token.clone();

        let mut registry = ProviderRegistry::new();
        registry.register(
            Channel::BASIC,
            2.0,
            always(),
            provider_fn(
                move |_: &Cursor, _: &MatchBindings, out: &mut ResultCollector<String>| {
                    out.offer("before".to_string());
                    trigger.cancel();
                    Ok(())
                },
            ),
        )?;
        registry.register(Channel::BASIC, 1.0, always(), recording(&log, "after"))?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector = ResultCollector::new().with_cancellation(token);
        let summary = engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("x"), &mut collector)
            .await?;

        assert_eq!(summary.stop, StopReason::Cancelled);
        assert!(invoked(&log).is_empty());
        assert_eq!(collector.results(), ["before"]);
        Ok(())
    }

    #[tokio::test]
    async fn provider_failure_keeps_earlier_results() -> Result<(), BoxError> {
        let log = Log::default();
        let mut registry = ProviderRegistry::new();
        registry.register_as("words", Channel::BASIC, 3.0, always(), recording(&log, "kept"))?;
        registry.register_as(
            "index",
            Channel::BASIC,
            2.0,
            always(),
            provider_fn(|_: &Cursor, _: &MatchBindings, _: &mut ResultCollector<String>| {
                Err("index is being rebuilt".into())
            })
            .named("index_lookup"),
        )?;
        registry.register_as("words", Channel::BASIC, 1.0, always(), recording(&log, "never"))?;

        let engine = DispatchEngine::new(registry.freeze());
        let mut collector = ResultCollector::new();
        let err = engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("x"), &mut collector)
            .await
            .err()
            .ok_or("dispatch should have failed")?;

        assert_eq!(err.registrant(), "index");
        assert_eq!(err.channel(), &Channel::BASIC);
        assert!(err.to_string().contains("index_lookup"));
        assert_eq!(collector.results(), ["kept"]);
        assert_eq!(invoked(&log), ["kept"]);
        Ok(())
    }

    // ─── Registration facade ────────────────────────────────────────────────────

    struct Keywords;

    impl Registrant<Cursor, String> for Keywords {
        fn name(&self) -> &str {
            "keywords"
        }

        fn register_providers(&self, registrar: &mut Registrar<'_, Cursor, String>) -> Result<(), BoxError> {
            registrar
                .extend_basic(place_fn(|ctx: &Cursor, _: &mut MatchBindings| {
                    !ctx.prefix().is_empty()
                }))
                .at_priority(10.0)
                .with_provider(provider_fn(
                    |ctx: &Cursor, _: &MatchBindings, out: &mut ResultCollector<String>| {
                        let prefix = ctx.prefix();
                        out.offer_all(
                            ["fn", "for", "let", "loop"]
                                .into_iter()
                                .filter(|kw| kw.starts_with(prefix))
                                .map(str::to_string),
                        );
                        Ok(())
                    },
                ));
            Ok(())
        }
    }

    struct Fallback;

    impl Registrant<Cursor, String> for Fallback {
        fn name(&self) -> &str {
            "fallback"
        }

        fn register_providers(&self, registrar: &mut Registrar<'_, Cursor, String>) -> Result<(), BoxError> {
            registrar.extend_basic(always()).with_provider(provider_fn(
                |_: &Cursor, _: &MatchBindings, out: &mut ResultCollector<String>| {
                    out.offer("todo!()".to_string());
                    Ok(())
                },
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn bootstrapped_registrants_dispatch_by_priority() -> Result<(), BoxError> {
        let registrants: [&dyn Registrant<Cursor, String>; 2] = [&Fallback, &Keywords];
        let registry = ProviderRegistry::bootstrap(registrants)?;
        let engine = DispatchEngine::new(registry.freeze());

        let mut collector = ResultCollector::new();
        engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("    fo"), &mut collector)
            .await?;
        assert_eq!(collector.results(), ["for", "todo!()"]);

        let mut collector = ResultCollector::new();
        engine
            .dispatch(&Channel::BASIC, &Cursor::at_end("x = "), &mut collector)
            .await?;
        assert_eq!(collector.results(), ["todo!()"]);
        Ok(())
    }

    // ─── Concurrency ────────────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dispatches_share_one_snapshot() -> Result<(), BoxError> {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Channel::BASIC,
            2.0,
            always(),
            provider_fn(|ctx: &Cursor, _: &MatchBindings, out: &mut ResultCollector<String>| {
                out.offer(format!("{}-first", ctx.prefix()));
                Ok(())
            }),
        )?;
        registry.register(
            Channel::BASIC,
            1.0,
            always(),
            provider_fn(|ctx: &Cursor, _: &MatchBindings, out: &mut ResultCollector<String>| {
                out.offer(format!("{}-second", ctx.prefix()));
                Ok(())
            }),
        )?;
        let engine = DispatchEngine::new(registry.freeze());

        let lines = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"];
        let tasks: Vec<_> = lines
            .into_iter()
            .map(|line| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let mut collector = ResultCollector::new();
                    engine
                        .dispatch(&Channel::BASIC, &Cursor::at_end(line), &mut collector)
                        .await
                        .map(|_| (line, collector.into_results()))
                })
            })
            .collect();

        for task in tasks {
            let (line, results) = task.await??;
            assert_eq!(results, [format!("{line}-first"), format!("{line}-second")]);
        }
        Ok(())
    }
}
