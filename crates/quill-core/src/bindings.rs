//! Match bindings: the scratch space a place fills in for its provider.
//!
//! A fresh [`MatchBindings`] is created for every place evaluation. Whatever
//! the place records while deciding whether it matches (a matched prefix, the
//! node it anchored on) is handed, read-only, to the provider bound to that
//! place and dropped right after the provider returns.
//!
//! Values are addressed through typed [`BindingKey`]s, so a place and its
//! provider agree on both the name and the type of every entry:
//!
//! ```rust,ignore
//! const MATCHED_PREFIX: BindingKey<String> = BindingKey::new("matchedPrefix");
//!
//! let place = place_fn(|ctx: &Cursor, bindings: &mut MatchBindings| {
//!     bindings.insert(&MATCHED_PREFIX, ctx.prefix().to_string());
//!     true
//! });
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// A typed key into [`MatchBindings`].
pub struct BindingKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BindingKey<T> {
    /// Creates a key with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for BindingKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BindingKey<T> {}

impl<T> fmt::Debug for BindingKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BindingKey").field(&self.name).finish()
    }
}

/// Key/value scratch space populated during place evaluation.
#[derive(Default)]
pub struct MatchBindings {
    values: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl MatchBindings {
    /// Creates an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, replacing any previous value under the same name.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: &BindingKey<T>, value: T) {
        self.values.insert(key.name, Box::new(value));
    }

    /// Returns the value stored under `key`.
    ///
    /// Returns `None` if the entry is missing or was stored with a different
    /// type under the same name.
    pub fn get<T: 'static>(&self, key: &BindingKey<T>) -> Option<&T> {
        self.values.get(key.name).and_then(|v| v.downcast_ref::<T>())
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove<T: 'static>(&mut self, key: &BindingKey<T>) -> Option<T> {
        let value = self.values.remove(key.name)?;
        value.downcast::<T>().ok().map(|v| *v)
    }

    /// Returns `true` if any value is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterates over the stored key names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for MatchBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("MatchBindings")
            .field("names", &names)
            .finish()
    }
}
