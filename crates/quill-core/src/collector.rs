//! The per-query result sink.
//!
//! A [`ResultCollector`] is created by the caller for one dispatch and handed
//! by `&mut` to every matching provider in turn. It decides when collection
//! is over:
//!
//! - a result limit ([`with_limit`](ResultCollector::with_limit)),
//! - a caller-defined stop condition ([`stop_when`](ResultCollector::stop_when)),
//! - an explicit [`stop`](ResultCollector::stop) from a provider,
//! - or a fired [`CancellationToken`].
//!
//! Once any of these holds the collector is *saturated*; the dispatch engine
//! checks this before evaluating each further place and stops early.

use std::fmt;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::trace;

type StopCondition<R> = Box<dyn Fn(&[R]) -> bool + Send + Sync>;
type Forward<R> = Box<dyn Fn(&R) + Send + Sync>;

/// Append-only sink for the results of one dispatch.
pub struct ResultCollector<R> {
    results: Vec<R>,
    limit: Option<usize>,
    stop_condition: Option<StopCondition<R>>,
    cancellation: Option<CancellationToken>,
    forward: Option<Forward<R>>,
    stopped: bool,
    rejected: usize,
}

impl<R> Default for ResultCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResultCollector<R> {
    /// Creates an unbounded collector.
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            limit: None,
            stop_condition: None,
            cancellation: None,
            forward: None,
            stopped: false,
            rejected: 0,
        }
    }

    /// Creates a collector that saturates once `limit` results are held.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            results: Vec::with_capacity(limit.min(256)),
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Sets or clears the result limit.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Adds a caller-defined stop condition evaluated over the collected results.
    pub fn stop_when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&[R]) -> bool + Send + Sync + 'static,
    {
        self.stop_condition = Some(Box::new(condition));
        self
    }

    /// Ties this collector to a cancellation signal.
    ///
    /// Once the token fires the collector reports itself cancelled and
    /// saturated, and refuses further offers.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Offers a result.
    ///
    /// Returns whether the collector can still accept more. A result offered
    /// while the collector is already saturated is discarded and counted in
    /// [`rejected`](Self::rejected).
    pub fn offer(&mut self, result: R) -> bool {
        if self.is_saturated() {
            self.rejected += 1;
            trace!(rejected = self.rejected, "Collector saturated, result discarded");
            return false;
        }

        if let Some(forward) = &self.forward {
            forward(&result);
        }
        self.results.push(result);

        !self.is_saturated()
    }

    /// Offers results one by one until the collector saturates.
    ///
    /// Returns whether the collector can still accept more.
    pub fn offer_all<I>(&mut self, results: I) -> bool
    where
        I: IntoIterator<Item = R>,
    {
        for result in results {
            if !self.offer(result) {
                return false;
            }
        }
        !self.is_saturated()
    }

    /// Ends collection. Every later offer is rejected.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Returns `true` once the collector accepts no more results.
    pub fn is_saturated(&self) -> bool {
        self.stopped
            || self.is_cancelled()
            || self.limit.is_some_and(|limit| self.results.len() >= limit)
            || self
                .stop_condition
                .as_ref()
                .is_some_and(|condition| condition(&self.results))
    }

    /// Returns `true` if the caller's cancellation signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Returns the results collected so far, in offer order.
    pub fn results(&self) -> &[R] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of offers discarded because the collector was saturated.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Returns the configured result limit, if any.
    pub fn result_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Consumes the collector and returns the results in offer order.
    pub fn into_results(self) -> Vec<R> {
        self.results
    }
}

impl<R: Clone + Send + 'static> ResultCollector<R> {
    /// Streams every accepted result to `sender` as it is offered.
    ///
    /// The results are still kept in the collector. A closed receiver is
    /// ignored.
    pub fn with_stream(mut self, sender: UnboundedSender<R>) -> Self {
        self.forward = Some(Box::new(move |result: &R| {
            let _ = sender.send(result.clone());
        }));
        self
    }
}

impl<R> fmt::Debug for ResultCollector<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCollector")
            .field("len", &self.results.len())
            .field("limit", &self.limit)
            .field("stopped", &self.stopped)
            .field("cancelled", &self.is_cancelled())
            .field("rejected", &self.rejected)
            .finish_non_exhaustive()
    }
}
