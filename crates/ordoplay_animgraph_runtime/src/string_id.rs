// SPDX-License-Identifier: MIT OR Apache-2.0
//! String identifiers used for events, parameters and slots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interned-style string tag
///
/// An empty string is the invalid ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringId(String);

impl StringId {
    /// Create a new ID
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The invalid (empty) ID
    pub const fn invalid() -> Self {
        Self(String::new())
    }

    /// Whether this ID is set
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// Get the string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StringId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StringId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
