//! Timestamps.

use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in time, in milliseconds since the Unix epoch.
///
/// Produced only by a `Clock` implementation; the core never reads wall
/// time itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the Unix milliseconds.
    #[inline]
    #[must_use]
    pub const fn as_unix_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<Timestamp> for PropertyValue {
    fn from(ts: Timestamp) -> Self {
        PropertyValue::Integer(ts.as_unix_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_roundtrip() {
        let ts = Timestamp::from_unix_millis(1_700_000_000_000);
        assert_eq!(ts.as_unix_millis(), 1_700_000_000_000);
    }

    #[test]
    fn converts_to_integer_value() {
        let value = PropertyValue::from(Timestamp::from_unix_millis(5));
        assert_eq!(value, PropertyValue::Integer(5));
    }

    #[test]
    fn ordering_follows_time() {
        assert!(Timestamp::from_unix_millis(1) < Timestamp::from_unix_millis(2));
    }
}
