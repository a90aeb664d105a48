//! Dispatch channels.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An independent dispatch namespace.
///
/// Each channel owns its own ordered set of bindings; a provider registered
/// on one channel is never seen by a dispatch on another. The three
/// well-known completion channels are provided as constants, but any name
/// may be used.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(Cow<'static, str>);

impl Channel {
    /// Plain completion of whatever fits at the cursor.
    pub const BASIC: Self = Self(Cow::Borrowed("basic"));
    /// Type-aware completion, filtered by the expected type at the cursor.
    pub const SMART: Self = Self(Cow::Borrowed("smart"));
    /// Completion of class or type names, including ones not yet imported.
    pub const CLASS_NAME: Self = Self(Cow::Borrowed("class_name"));

    /// Creates a channel with a custom name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Channel {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Channel {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}
