//! Tower integration.
//!
//! [`ChannelService`] exposes one channel of a [`DispatchEngine`] as a
//! `tower::Service`, so dispatch can be wrapped in ordinary tower middleware:
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tower::{ServiceBuilder, ServiceExt};
//!
//! let service = ServiceBuilder::new()
//!     .concurrency_limit(8)
//!     .service(engine.service(Channel::BASIC));
//!
//! let outcome = service
//!     .oneshot(Query::new(Arc::new(cursor), ResultCollector::with_limit(50)))
//!     .await?;
//! ```
//!
//! The service never fails on its own: the dispatch result travels inside
//! [`QueryOutcome`] together with the collector, so partial results are not
//! lost when a provider fails.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;

use crate::channel::Channel;
use crate::collector::ResultCollector;
use crate::context::QueryContext;
use crate::dispatcher::{DispatchEngine, DispatchSummary};
use crate::error::DispatchError;

/// A request to a [`ChannelService`].
pub struct Query<Q: ?Sized, R> {
    /// The query context, shared with whoever issued the query.
    pub context: Arc<Q>,
    /// The collector results are offered to.
    pub collector: ResultCollector<R>,
}

impl<Q: ?Sized, R> Query<Q, R> {
    pub fn new(context: Arc<Q>, collector: ResultCollector<R>) -> Self {
        Self { context, collector }
    }
}

impl<Q: ?Sized, R> fmt::Debug for Query<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}

/// The response of a [`ChannelService`].
#[derive(Debug)]
pub struct QueryOutcome<R> {
    /// The collector, holding every result offered before the dispatch ended.
    pub collector: ResultCollector<R>,
    /// The dispatch result.
    pub result: Result<DispatchSummary, DispatchError>,
}

impl<R> QueryOutcome<R> {
    /// Returns the collected results, or the dispatch error.
    pub fn into_results(self) -> Result<Vec<R>, DispatchError> {
        self.result.map(|_| self.collector.into_results())
    }
}

/// A `tower::Service` dispatching every request on one channel.
pub struct ChannelService<Q: ?Sized, R> {
    engine: DispatchEngine<Q, R>,
    channel: Channel,
}

impl<Q: ?Sized, R> Clone for ChannelService<Q, R> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            channel: self.channel.clone(),
        }
    }
}

impl<Q, R> ChannelService<Q, R>
where
    Q: QueryContext + ?Sized,
    R: Send + 'static,
{
    pub fn new(engine: DispatchEngine<Q, R>, channel: Channel) -> Self {
        Self { engine, channel }
    }

    /// The channel this service dispatches on.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl<Q, R> Service<Query<Q, R>> for ChannelService<Q, R>
where
    Q: QueryContext + ?Sized + 'static,
    R: Send + 'static,
{
    type Response = QueryOutcome<R>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, query: Query<Q, R>) -> Self::Future {
        let service = self.clone();

        Box::pin(async move {
            let Query {
                context,
                mut collector,
            } = query;
            let result = service
                .engine
                .dispatch(&service.channel, &context, &mut collector)
                .await;
            Ok(QueryOutcome { collector, result })
        })
    }
}

impl<Q: ?Sized, R> fmt::Debug for ChannelService<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelService")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
