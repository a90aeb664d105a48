//! Registration facade: how registrants attach providers at bootstrap.
//!
//! Each [`Registrant`] is asked exactly once per bootstrap to describe its
//! providers through a [`Registrar`]. A registration reads as a small builder
//! chain:
//!
//! ```rust,ignore
//! impl Registrant<Cursor, Suggestion> for KeywordContributor {
//!     fn name(&self) -> &str {
//!         "keywords"
//!     }
//!
//!     fn register_providers(
//!         &self,
//!         registrar: &mut Registrar<'_, Cursor, Suggestion>,
//!     ) -> Result<(), BoxError> {
//!         registrar
//!             .extend_basic(statement_start())
//!             .at_priority(100.0)
//!             .with_provider(KeywordProvider);
//!         registrar
//!             .extend_smart(after_return())
//!             .with_provider(ReturnValueProvider);
//!         Ok(())
//!     }
//! }
//! ```
//!
//! A [`Placement`] that is dropped without `with_provider` is reported as
//! [`RegistrationError::IncompletePlacement`] and fails the bootstrap.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::channel::Channel;
use crate::context::QueryContext;
use crate::error::{BoxError, RegistrationError};
use crate::place::Place;
use crate::provider::Provider;
use crate::registry::ProviderRegistry;

/// Priority of a placement whose `at_priority` was never called.
pub const DEFAULT_PRIORITY: f64 = 0.0;

/// An external contributor of providers.
pub trait Registrant<Q: ?Sized, R>: Send + Sync {
    /// Name used in logs, errors and configuration.
    fn name(&self) -> &str;

    /// The channels this registrant may extend. `None` allows any channel.
    fn channels(&self) -> Option<Vec<Channel>> {
        None
    }

    /// Describes this registrant's providers.
    ///
    /// Called exactly once per bootstrap. A re-run bootstrap starts from an
    /// empty registry, so this must register the same providers every time.
    fn register_providers(&self, registrar: &mut Registrar<'_, Q, R>) -> Result<(), BoxError>;
}

/// Builder handed to a [`Registrant`] during bootstrap.
pub struct Registrar<'r, Q: ?Sized, R> {
    registry: &'r mut ProviderRegistry<Q, R>,
    registrant: Arc<str>,
    allowed: Option<Vec<Channel>>,
    registered: usize,
    errors: Vec<RegistrationError>,
}

impl<'r, Q, R> Registrar<'r, Q, R>
where
    Q: QueryContext + ?Sized,
    R: Send + 'static,
{
    /// Creates a registrar that records bindings under `registrant`.
    ///
    /// `allowed` restricts the channels that may be extended.
    pub fn new(
        registry: &'r mut ProviderRegistry<Q, R>,
        registrant: impl Into<Arc<str>>,
        allowed: Option<Vec<Channel>>,
    ) -> Self {
        Self {
            registry,
            registrant: registrant.into(),
            allowed,
            registered: 0,
            errors: Vec::new(),
        }
    }

    /// Name of the registrant this registrar records for.
    pub fn registrant(&self) -> &str {
        &self.registrant
    }

    /// Starts a placement of `place` on `channel`.
    pub fn extend<P>(&mut self, channel: Channel, place: P) -> Placement<'_, 'r, Q, R>
    where
        P: Place<Q> + 'static,
    {
        let declared = self
            .allowed
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&channel));

        let place: Option<Box<dyn Place<Q>>> = if declared {
            Some(Box::new(place))
        } else {
            self.errors.push(RegistrationError::UndeclaredChannel {
                registrant: Arc::clone(&self.registrant),
                channel: channel.clone(),
            });
            None
        };

        Placement {
            registrar: self,
            channel,
            place,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Starts a placement on [`Channel::BASIC`].
    pub fn extend_basic<P>(&mut self, place: P) -> Placement<'_, 'r, Q, R>
    where
        P: Place<Q> + 'static,
    {
        self.extend(Channel::BASIC, place)
    }

    /// Starts a placement on [`Channel::SMART`].
    pub fn extend_smart<P>(&mut self, place: P) -> Placement<'_, 'r, Q, R>
    where
        P: Place<Q> + 'static,
    {
        self.extend(Channel::SMART, place)
    }

    /// Starts a placement on [`Channel::CLASS_NAME`].
    pub fn extend_class_name<P>(&mut self, place: P) -> Placement<'_, 'r, Q, R>
    where
        P: Place<Q> + 'static,
    {
        self.extend(Channel::CLASS_NAME, place)
    }

    /// Number of bindings registered through this registrar so far.
    pub fn registered(&self) -> usize {
        self.registered
    }

    /// Ends registration, surfacing the first deferred error.
    ///
    /// Returns the number of bindings registered.
    pub fn finish(mut self) -> Result<usize, RegistrationError> {
        if self.errors.is_empty() {
            return Ok(self.registered);
        }
        for e in &self.errors[1..] {
            error!(registrant = %self.registrant, error = %e, "Additional registration error");
        }
        Err(self.errors.swap_remove(0))
    }
}

/// A placement in progress: a place on a channel, waiting for a provider.
#[must_use = "a placement registers nothing until `with_provider` is called"]
pub struct Placement<'a, 'r, Q: ?Sized, R> {
    registrar: &'a mut Registrar<'r, Q, R>,
    channel: Channel,
    place: Option<Box<dyn Place<Q>>>,
    priority: f64,
}

impl<Q: ?Sized, R> Placement<'_, '_, Q, R> {
    /// Sets the priority. Higher priorities are dispatched first.
    pub fn at_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Finishes the placement, registering `provider` at this place.
    pub fn with_provider<V>(mut self, provider: V)
    where
        Q: QueryContext,
        R: Send + 'static,
        V: Provider<Q, R> + 'static,
    {
        // A placement on an undeclared channel has already been reported.
        let Some(place) = self.place.take() else {
            return;
        };

        let registrar = &mut *self.registrar;
        let result = registrar.registry.insert(
            Arc::clone(&registrar.registrant),
            self.channel.clone(),
            self.priority,
            place,
            Box::new(provider),
        );
        match result {
            Ok(()) => registrar.registered += 1,
            Err(e) => registrar.errors.push(e),
        }
    }
}

impl<Q: ?Sized, R> Drop for Placement<'_, '_, Q, R> {
    fn drop(&mut self) {
        if self.place.is_some() {
            self.registrar
                .errors
                .push(RegistrationError::IncompletePlacement {
                    registrant: Arc::clone(&self.registrar.registrant),
                    channel: self.channel.clone(),
                });
        }
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

impl<Q, R> ProviderRegistry<Q, R>
where
    Q: QueryContext + ?Sized,
    R: Send + 'static,
{
    /// Runs one registrant against this registry.
    ///
    /// Returns the number of bindings it registered. If the registrant fails,
    /// every binding it added is removed again.
    pub fn install(&mut self, registrant: &dyn Registrant<Q, R>) -> Result<usize, RegistrationError> {
        let name: Arc<str> = Arc::from(registrant.name());
        let mark = self.mark();

        let mut registrar = Registrar::new(&mut *self, Arc::clone(&name), registrant.channels());
        let outcome = registrant.register_providers(&mut registrar);
        let deferred = registrar.finish();

        let result = match (outcome, deferred) {
            (Ok(()), deferred) => deferred,
            (Err(source), deferred) => {
                if let Err(e) = deferred {
                    error!(registrant = %name, error = %e, "Registration error");
                }
                Err(RegistrationError::Registrant {
                    registrant: Arc::clone(&name),
                    source,
                })
            }
        };

        match result {
            Ok(registered) => {
                debug!(registrant = %name, registered, "Registrant installed");
                Ok(registered)
            }
            Err(e) => {
                self.rollback(mark);
                Err(e)
            }
        }
    }

    /// Builds a registry from `registrants`, in the given order.
    ///
    /// Registrant order only affects the tie-break between equal priorities.
    /// The first failing registrant aborts bootstrap.
    pub fn bootstrap<'a, I>(registrants: I) -> Result<Self, RegistrationError>
    where
        I: IntoIterator<Item = &'a dyn Registrant<Q, R>>,
        Q: 'a,
        R: 'a,
    {
        let mut registry = Self::new();
        let mut count = 0;

        for registrant in registrants {
            registry.install(registrant)?;
            count += 1;
        }

        info!(
            registrants = count,
            bindings = registry.len(),
            "Provider registry bootstrapped"
        );
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::MatchBindings;
    use crate::collector::ResultCollector;
    use crate::place::{always, never};
    use crate::provider::provider_fn;

    struct Pos;

    impl QueryContext for Pos {
        type Position = ();

        fn position(&self) -> &() {
            &()
        }
    }

    fn noop() -> impl Provider<Pos, ()> {
        provider_fn(|_: &Pos, _: &MatchBindings, _: &mut ResultCollector<()>| Ok(()))
    }

    struct Contributor {
        name: &'static str,
        channels: Option<Vec<Channel>>,
        register: fn(&mut Registrar<'_, Pos, ()>),
    }

    impl Registrant<Pos, ()> for Contributor {
        fn name(&self) -> &str {
            self.name
        }

        fn channels(&self) -> Option<Vec<Channel>> {
            self.channels.clone()
        }

        fn register_providers(&self, registrar: &mut Registrar<'_, Pos, ()>) -> Result<(), BoxError> {
            (self.register)(registrar);
            Ok(())
        }
    }

    struct Failing;

    impl Registrant<Pos, ()> for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn register_providers(&self, _: &mut Registrar<'_, Pos, ()>) -> Result<(), BoxError> {
            Err("index not ready".into())
        }
    }

    struct FailsAfterRegistering;

    impl Registrant<Pos, ()> for FailsAfterRegistering {
        fn name(&self) -> &str {
            "fails_after_registering"
        }

        fn register_providers(&self, registrar: &mut Registrar<'_, Pos, ()>) -> Result<(), BoxError> {
            registrar.extend_basic(always()).with_provider(noop());
            let _ = registrar.extend_smart(always());
            Err("index not ready".into())
        }
    }

    fn contributor(name: &'static str, register: fn(&mut Registrar<'_, Pos, ()>)) -> Contributor {
        Contributor {
            name,
            channels: None,
            register,
        }
    }

    #[test]
    fn placements_land_on_their_channels() -> Result<(), RegistrationError> {
        let c = contributor("words", |r| {
            r.extend_basic(always()).at_priority(2.0).with_provider(noop());
            r.extend_smart(never()).with_provider(noop());
            r.extend_class_name(always()).at_priority(-1.0).with_provider(noop());
            r.extend(Channel::new("snippets"), always()).with_provider(noop());
        });

        let registry = ProviderRegistry::bootstrap([&c as &dyn Registrant<Pos, ()>])?;
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.binding_count(&Channel::new("snippets")), 1);

        let smart = registry.bindings_for(&Channel::SMART);
        assert_eq!(smart[0].priority(), DEFAULT_PRIORITY);
        assert_eq!(smart[0].registrant(), "words");
        Ok(())
    }

    #[test]
    fn registrant_order_breaks_priority_ties() -> Result<(), RegistrationError> {
        let first = contributor("first", |r| {
            r.extend_basic(always()).at_priority(1.0).with_provider(noop());
        });
        let second = contributor("second", |r| {
            r.extend_basic(always()).at_priority(1.0).with_provider(noop());
            r.extend_basic(always()).at_priority(3.0).with_provider(noop());
        });

        let registry = ProviderRegistry::bootstrap([
            &second as &dyn Registrant<Pos, ()>,
            &first as &dyn Registrant<Pos, ()>,
        ])?;
        let names: Vec<_> = registry
            .bindings_for(&Channel::BASIC)
            .iter()
            .map(|b| (b.registrant().to_string(), b.priority()))
            .collect();
        assert_eq!(
            names,
            [
                ("second".to_string(), 3.0),
                ("second".to_string(), 1.0),
                ("first".to_string(), 1.0),
            ]
        );
        Ok(())
    }

    #[test]
    fn incomplete_placement_fails_bootstrap() {
        let c = contributor("half_built", |r| {
            let _ = r.extend_basic(always()).at_priority(5.0);
        });

        let err = ProviderRegistry::bootstrap([&c as &dyn Registrant<Pos, ()>]);
        assert!(matches!(
            err,
            Err(RegistrationError::IncompletePlacement { ref channel, .. }) if *channel == Channel::BASIC
        ));
    }

    #[test]
    fn undeclared_channel_fails_bootstrap() {
        let c = Contributor {
            name: "scoped",
            channels: Some(vec![Channel::SMART]),
            register: |r| {
                r.extend_smart(always()).with_provider(noop());
                r.extend_basic(always()).with_provider(noop());
            },
        };

        let err = ProviderRegistry::bootstrap([&c as &dyn Registrant<Pos, ()>]);
        assert!(matches!(
            err,
            Err(RegistrationError::UndeclaredChannel { ref channel, .. }) if *channel == Channel::BASIC
        ));
    }

    #[test]
    fn nan_priority_fails_bootstrap() {
        let c = contributor("nan", |r| {
            r.extend_basic(always()).at_priority(f64::NAN).with_provider(noop());
        });

        let err = ProviderRegistry::bootstrap([&c as &dyn Registrant<Pos, ()>]);
        assert!(matches!(err, Err(RegistrationError::InvalidPriority { .. })));
    }

    #[test]
    fn registrant_error_is_reported_with_its_name() {
        let err = ProviderRegistry::bootstrap([&Failing as &dyn Registrant<Pos, ()>]);
        match err {
            Err(RegistrationError::Registrant { registrant, source }) => {
                assert_eq!(&*registrant, "failing");
                assert_eq!(source.to_string(), "index not ready");
            }
            other => panic!("expected registrant error, got {other:?}"),
        }
    }

    #[test]
    fn failed_install_leaves_the_registry_untouched() -> Result<(), RegistrationError> {
        let kept = contributor("kept", |r| {
            r.extend_basic(always()).at_priority(1.0).with_provider(noop());
        });
        let half_built = contributor("half_built", |r| {
            r.extend_basic(always()).with_provider(noop());
            r.extend(Channel::new("snippets"), always()).with_provider(noop());
            let _ = r.extend_smart(always());
        });

        let mut registry = ProviderRegistry::new();
        registry.install(&kept)?;

        assert!(registry.install(&half_built).is_err());
        assert!(matches!(
            registry.install(&FailsAfterRegistering),
            Err(RegistrationError::Registrant { .. })
        ));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.binding_count(&Channel::new("snippets")), 0);
        assert!(registry.channels().all(|c| *c == Channel::BASIC));

        // Later registrations still order after the surviving binding.
        registry.install(&kept)?;
        let sequences: Vec<_> = registry
            .bindings_for(&Channel::BASIC)
            .iter()
            .map(|b| b.sequence())
            .collect();
        assert_eq!(sequences, [0, 1]);
        Ok(())
    }

    #[test]
    fn rerunning_bootstrap_starts_from_scratch() -> Result<(), RegistrationError> {
        let c = contributor("stable", |r| {
            r.extend_basic(always()).with_provider(noop());
        });

        let once = ProviderRegistry::bootstrap([&c as &dyn Registrant<Pos, ()>])?;
        let twice = ProviderRegistry::bootstrap([&c as &dyn Registrant<Pos, ()>])?;
        assert_eq!(once.len(), twice.len());
        Ok(())
    }
}
