//! The provider registry.
//!
//! [`ProviderRegistry`] is the mutable, bootstrap-time form: registrants
//! append [`Binding`]s to channels in any order. Once bootstrap is done the
//! registry is [`freeze`](ProviderRegistry::freeze)d into a
//! [`RegistrySnapshot`], which sorts every channel once and offers no way to
//! add or remove bindings. Dispatch only ever runs against a snapshot.
//!
//! # Ordering
//!
//! Bindings are ordered by descending priority. Bindings with equal priority
//! keep their registration order: whichever was registered first runs first.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::channel::Channel;
use crate::context::QueryContext;
use crate::error::RegistrationError;
use crate::place::Place;
use crate::provider::Provider;

const ANONYMOUS: &str = "<anonymous>";

/// One registered (priority, place, provider) triple.
///
/// Immutable once registered and owned by the registry that holds it.
pub struct Binding<Q: ?Sized, R> {
    priority: f64,
    place: Box<dyn Place<Q>>,
    provider: Box<dyn Provider<Q, R>>,
    registrant: Arc<str>,
    sequence: u64,
}

impl<Q: ?Sized, R> Binding<Q, R> {
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Name of the registrant that contributed this binding.
    pub fn registrant(&self) -> &str {
        &self.registrant
    }

    pub(crate) fn registrant_arc(&self) -> &Arc<str> {
        &self.registrant
    }

    /// Global registration sequence number; breaks priority ties.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub(crate) fn place(&self) -> &dyn Place<Q> {
        self.place.as_ref()
    }

    pub(crate) fn provider(&self) -> &dyn Provider<Q, R> {
        self.provider.as_ref()
    }
}

impl<Q: ?Sized, R> fmt::Debug for Binding<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("priority", &self.priority)
            .field("registrant", &self.registrant)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Dispatch order: higher priority first, then earlier registration first.
fn dispatch_order<Q: ?Sized, R>(a: &Binding<Q, R>, b: &Binding<Q, R>) -> Ordering {
    b.priority
        .partial_cmp(&a.priority)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.sequence.cmp(&b.sequence))
}

// =============================================================================
// ProviderRegistry
// =============================================================================

/// Bootstrap-time registry of bindings, partitioned by channel.
pub struct ProviderRegistry<Q: ?Sized, R> {
    channels: HashMap<Channel, Vec<Binding<Q, R>>>,
    next_sequence: u64,
}

impl<Q: ?Sized, R> Default for ProviderRegistry<Q, R> {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl<Q, R> ProviderRegistry<Q, R>
where
    Q: QueryContext + ?Sized,
    R: Send + 'static,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` at `place` on `channel`.
    ///
    /// Duplicates are allowed and fire independently. Fails only if
    /// `priority` is NaN.
    pub fn register<P, V>(
        &mut self,
        channel: Channel,
        priority: f64,
        place: P,
        provider: V,
    ) -> Result<(), RegistrationError>
    where
        P: Place<Q> + 'static,
        V: Provider<Q, R> + 'static,
    {
        self.register_as(ANONYMOUS, channel, priority, place, provider)
    }

    /// Like [`register`](Self::register), attributing the binding to `registrant`.
    pub fn register_as<P, V>(
        &mut self,
        registrant: &str,
        channel: Channel,
        priority: f64,
        place: P,
        provider: V,
    ) -> Result<(), RegistrationError>
    where
        P: Place<Q> + 'static,
        V: Provider<Q, R> + 'static,
    {
        self.insert(
            Arc::from(registrant),
            channel,
            priority,
            Box::new(place),
            Box::new(provider),
        )
    }

    pub(crate) fn insert(
        &mut self,
        registrant: Arc<str>,
        channel: Channel,
        priority: f64,
        place: Box<dyn Place<Q>>,
        provider: Box<dyn Provider<Q, R>>,
    ) -> Result<(), RegistrationError> {
        if priority.is_nan() {
            return Err(RegistrationError::InvalidPriority {
                registrant,
                channel,
                priority,
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        debug!(
            channel = %channel,
            registrant = %registrant,
            provider = provider.name(),
            priority,
            sequence,
            "Registered provider"
        );

        self.channels.entry(channel).or_default().push(Binding {
            priority,
            place,
            provider,
            registrant,
            sequence,
        });
        Ok(())
    }

    /// Returns a mark that [`rollback`](Self::rollback) can return to.
    pub(crate) fn mark(&self) -> u64 {
        self.next_sequence
    }

    /// Removes every binding registered since `mark` was taken.
    pub(crate) fn rollback(&mut self, mark: u64) {
        for bindings in self.channels.values_mut() {
            bindings.retain(|b| b.sequence < mark);
        }
        self.channels.retain(|_, bindings| !bindings.is_empty());
        self.next_sequence = mark;
    }

    /// Returns the bindings of `channel` in dispatch order.
    ///
    /// The result depends only on the registry's contents: two calls without
    /// an intervening registration return the same sequence.
    pub fn bindings_for(&self, channel: &Channel) -> Vec<&Binding<Q, R>> {
        let mut bindings: Vec<_> = self
            .channels
            .get(channel)
            .map(|bindings| bindings.iter().collect())
            .unwrap_or_default();
        bindings.sort_by(|a, b| dispatch_order(*a, *b));
        bindings
    }

    /// Returns the channels that have at least one binding.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.keys()
    }

    /// Returns the number of bindings on `channel`.
    pub fn binding_count(&self, channel: &Channel) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    /// Total number of bindings across all channels.
    pub fn len(&self) -> usize {
        self.channels.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorts every channel and seals the registry into an immutable snapshot.
    pub fn freeze(self) -> RegistrySnapshot<Q, R> {
        let channels: HashMap<_, _> = self
            .channels
            .into_iter()
            .map(|(channel, mut bindings)| {
                bindings.sort_by(dispatch_order);
                trace!(channel = %channel, bindings = bindings.len(), "Froze channel");
                (channel, bindings.into_boxed_slice())
            })
            .collect();

        RegistrySnapshot { channels }
    }
}

impl<Q: ?Sized, R> fmt::Debug for ProviderRegistry<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<_, _> = self
            .channels
            .iter()
            .map(|(channel, bindings)| (channel, bindings.len()))
            .collect();
        f.debug_struct("ProviderRegistry")
            .field("channels", &counts)
            .finish()
    }
}

// =============================================================================
// RegistrySnapshot
// =============================================================================

/// Immutable, dispatch-ready view of a registry.
///
/// Every channel is already in dispatch order. The snapshot is `Send + Sync`
/// and is shared between concurrent dispatches behind an `Arc`.
pub struct RegistrySnapshot<Q: ?Sized, R> {
    channels: HashMap<Channel, Box<[Binding<Q, R>]>>,
}

impl<Q: ?Sized, R> Default for RegistrySnapshot<Q, R> {
    fn default() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }
}

impl<Q: ?Sized, R> RegistrySnapshot<Q, R> {
    /// Creates a snapshot with no bindings.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the bindings of `channel` in dispatch order.
    ///
    /// Unknown channels yield an empty slice.
    pub fn bindings_for(&self, channel: &Channel) -> &[Binding<Q, R>] {
        self.channels.get(channel).map(|b| &**b).unwrap_or(&[])
    }

    /// Returns the channels that have at least one binding.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.keys()
    }

    /// Total number of bindings across all channels.
    pub fn len(&self) -> usize {
        self.channels.values().map(|bindings| bindings.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns binding counts per channel.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            bindings: self
                .channels
                .iter()
                .map(|(channel, bindings)| (channel.clone(), bindings.len()))
                .collect(),
        }
    }
}

impl<Q: ?Sized, R> fmt::Debug for RegistrySnapshot<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySnapshot")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Statistics about a frozen registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of bindings per channel.
    pub bindings: BTreeMap<Channel, usize>,
}

impl RegistryStats {
    /// Total number of bindings.
    pub fn total(&self) -> usize {
        self.bindings.values().sum()
    }
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} binding(s)", self.total())?;
        let mut sep = " (";
        for (channel, count) in &self.bindings {
            write!(f, "{sep}{channel}: {count}")?;
            sep = ", ";
        }
        if !self.bindings.is_empty() {
            f.write_str(")")?;
        }
        Ok(())
    }
}
