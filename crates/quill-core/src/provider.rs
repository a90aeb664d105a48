//! Providers: the unit of extension that produces candidate results.

use std::borrow::Cow;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::bindings::MatchBindings;
use crate::collector::ResultCollector;
use crate::context::QueryContext;
use crate::error::BoxError;

/// Produces results for a query whose place matched.
///
/// Providers run one at a time, in priority order, and may suspend (for
/// instance while awaiting an index lookup). A provider that runs for long
/// should poll [`ResultCollector::is_saturated`] and return early once it
/// reports `true`.
///
/// # Example
///
/// ```rust,ignore
/// struct KeywordProvider;
///
/// #[async_trait]
/// impl Provider<Cursor, String> for KeywordProvider {
///     async fn provide(
///         &self,
///         ctx: &Cursor,
///         _bindings: &MatchBindings,
///         collector: &mut ResultCollector<String>,
///     ) -> Result<(), BoxError> {
///         for kw in KEYWORDS.iter().filter(|kw| kw.starts_with(ctx.prefix())) {
///             if !collector.offer(kw.to_string()) {
///                 break;
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Provider<Q: ?Sized, R>: Send + Sync {
    /// Adds results for `ctx` to `collector`.
    ///
    /// `bindings` holds whatever this provider's place recorded while
    /// matching. An error aborts the current dispatch; results already
    /// offered remain in the collector.
    async fn provide(
        &self,
        ctx: &Q,
        bindings: &MatchBindings,
        collector: &mut ResultCollector<R>,
    ) -> Result<(), BoxError>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A provider backed by a synchronous closure. Created by [`provider_fn`].
pub struct ProviderFn<F, Q: ?Sized, R> {
    f: F,
    name: Cow<'static, str>,
    _marker: PhantomData<fn(&Q) -> R>,
}

/// Adapts a synchronous closure into a [`Provider`].
pub fn provider_fn<Q, R, F>(f: F) -> ProviderFn<F, Q, R>
where
    Q: QueryContext + ?Sized,
    R: Send + 'static,
    F: Fn(&Q, &MatchBindings, &mut ResultCollector<R>) -> Result<(), BoxError> + Send + Sync,
{
    ProviderFn {
        f,
        name: Cow::Borrowed("provider_fn"),
        _marker: PhantomData,
    }
}

impl<F, Q: ?Sized, R> ProviderFn<F, Q, R> {
    /// Names the provider for logs and errors.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<F, Q, R> Provider<Q, R> for ProviderFn<F, Q, R>
where
    Q: QueryContext + ?Sized,
    R: Send + 'static,
    F: Fn(&Q, &MatchBindings, &mut ResultCollector<R>) -> Result<(), BoxError> + Send + Sync,
{
    async fn provide(
        &self,
        ctx: &Q,
        bindings: &MatchBindings,
        collector: &mut ResultCollector<R>,
    ) -> Result<(), BoxError> {
        (self.f)(ctx, bindings, collector)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
