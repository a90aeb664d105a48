//! Places: predicates deciding whether a provider applies to a query.
//!
//! A [`Place`] looks at the [`QueryContext`] and answers whether its provider
//! should run. While deciding it may record bindings for the provider.
//!
//! Returning `Ok(false)` and returning `Err(NoMatch.into())` are equivalent
//! ways of declining; any other error aborts the dispatch.
//!
//! Closures are adapted with [`place_fn`] and [`try_place_fn`]:
//!
//! ```rust,ignore
//! let after_dot = place_fn(|ctx: &Cursor, _bindings: &mut MatchBindings| {
//!     ctx.text_before().ends_with('.')
//! });
//!
//! let in_import = try_place_fn(|ctx: &Cursor, _bindings: &mut MatchBindings| {
//!     let node = ctx.node().ok_or(NoMatch)?;
//!     Ok(node.kind() == "import_declaration")
//! });
//!
//! registrar.extend_basic(after_dot.and(in_import.not()));
//! ```

use std::marker::PhantomData;

use crate::bindings::MatchBindings;
use crate::context::QueryContext;
use crate::error::{BoxError, NoMatch};

/// A predicate over the query context.
pub trait Place<Q: ?Sized>: Send + Sync {
    /// Decides whether this place accepts `ctx`, recording bindings for the
    /// provider as a side effect.
    fn matches(&self, ctx: &Q, bindings: &mut MatchBindings) -> Result<bool, BoxError>;
}

impl<Q: ?Sized, P: Place<Q> + ?Sized> Place<Q> for Box<P> {
    fn matches(&self, ctx: &Q, bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        (**self).matches(ctx, bindings)
    }
}

/// Folds the [`NoMatch`] signal into a plain `false`.
fn accepts<Q: ?Sized, P: Place<Q> + ?Sized>(
    place: &P,
    ctx: &Q,
    bindings: &mut MatchBindings,
) -> Result<bool, BoxError> {
    match place.matches(ctx, bindings) {
        Err(e) if e.is::<NoMatch>() => Ok(false),
        other => other,
    }
}

// ─── Closure adapters ───────────────────────────────────────────────────────

/// A place backed by an infallible closure. Created by [`place_fn`].
pub struct PlaceFn<F, Q: ?Sized> {
    f: F,
    _marker: PhantomData<fn(&Q)>,
}

/// Adapts `Fn(&Q, &mut MatchBindings) -> bool` into a [`Place`].
pub fn place_fn<Q, F>(f: F) -> PlaceFn<F, Q>
where
    Q: QueryContext + ?Sized,
    F: Fn(&Q, &mut MatchBindings) -> bool + Send + Sync,
{
    PlaceFn {
        f,
        _marker: PhantomData,
    }
}

impl<Q, F> Place<Q> for PlaceFn<F, Q>
where
    Q: QueryContext + ?Sized,
    F: Fn(&Q, &mut MatchBindings) -> bool + Send + Sync,
{
    fn matches(&self, ctx: &Q, bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        Ok((self.f)(ctx, bindings))
    }
}

/// A place backed by a fallible closure. Created by [`try_place_fn`].
pub struct TryPlaceFn<F, Q: ?Sized> {
    f: F,
    _marker: PhantomData<fn(&Q)>,
}

/// Adapts `Fn(&Q, &mut MatchBindings) -> Result<bool, BoxError>` into a [`Place`].
pub fn try_place_fn<Q, F>(f: F) -> TryPlaceFn<F, Q>
where
    Q: QueryContext + ?Sized,
    F: Fn(&Q, &mut MatchBindings) -> Result<bool, BoxError> + Send + Sync,
{
    TryPlaceFn {
        f,
        _marker: PhantomData,
    }
}

impl<Q, F> Place<Q> for TryPlaceFn<F, Q>
where
    Q: QueryContext + ?Sized,
    F: Fn(&Q, &mut MatchBindings) -> Result<bool, BoxError> + Send + Sync,
{
    fn matches(&self, ctx: &Q, bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        (self.f)(ctx, bindings)
    }
}

// ─── Constant places ────────────────────────────────────────────────────────

/// Matches every context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

/// Matches no context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

/// Returns a place that matches every context.
pub fn always() -> Always {
    Always
}

/// Returns a place that matches no context.
pub fn never() -> Never {
    Never
}

impl<Q: ?Sized> Place<Q> for Always {
    fn matches(&self, _ctx: &Q, _bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        Ok(true)
    }
}

impl<Q: ?Sized> Place<Q> for Never {
    fn matches(&self, _ctx: &Q, _bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        Ok(false)
    }
}

// ─── Combinators ────────────────────────────────────────────────────────────

/// Both places must match. The right side is only evaluated if the left matched.
pub struct And<A, B>(A, B);

/// Either place must match. The right side is only evaluated if the left did not.
///
/// Bindings written by a declining left side are kept.
pub struct Or<A, B>(A, B);

/// Inverts a place. Bindings written by the inner place are kept.
pub struct Not<A>(A);

impl<Q: ?Sized, A: Place<Q>, B: Place<Q>> Place<Q> for And<A, B> {
    fn matches(&self, ctx: &Q, bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        Ok(accepts(&self.0, ctx, bindings)? && accepts(&self.1, ctx, bindings)?)
    }
}

impl<Q: ?Sized, A: Place<Q>, B: Place<Q>> Place<Q> for Or<A, B> {
    fn matches(&self, ctx: &Q, bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        Ok(accepts(&self.0, ctx, bindings)? || accepts(&self.1, ctx, bindings)?)
    }
}

impl<Q: ?Sized, A: Place<Q>> Place<Q> for Not<A> {
    fn matches(&self, ctx: &Q, bindings: &mut MatchBindings) -> Result<bool, BoxError> {
        Ok(!accepts(&self.0, ctx, bindings)?)
    }
}

/// Combinator methods available on every [`Place`].
pub trait PlaceExt<Q: ?Sized>: Place<Q> + Sized {
    fn and<B: Place<Q>>(self, other: B) -> And<Self, B> {
        And(self, other)
    }

    fn or<B: Place<Q>>(self, other: B) -> Or<Self, B> {
        Or(self, other)
    }

    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<Q: ?Sized, P: Place<Q>> PlaceExt<Q> for P {}
