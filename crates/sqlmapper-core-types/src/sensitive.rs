//! Redacting wrapper for database secrets
//!
//! A context's SQLCipher key is read from config and held in context state
//! until the connection is opened. Wrapped in `Sensitive`, it prints as
//! [`REDACTED`] wherever the config or an error is formatted.

use serde::{Deserialize, Deserializer};
use std::fmt;

/// What a `Sensitive` value prints as
pub const REDACTED: &str = "***REDACTED***";

/// A value that never shows up in `Debug` or `Display` output
///
/// # Example
///
/// ```
/// use sqlmapper_core_types::Sensitive;
///
/// let key = Sensitive::new("sqlcipher-key");
/// assert_eq!(format!("{:?}", key), "***REDACTED***");
/// assert_eq!(key.expose(), &"sqlcipher-key");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// The raw value; only `PRAGMA key` should need it
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Sensitive<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

// Config files hold the bare value
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Sensitive<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Self)
    }
}
