//! Canonical timestamp type shared by records and collection watermarks.
//!
//! A [`Timestamp`] is a count of milliseconds since the Unix epoch. On the
//! wire it is written as an RFC 3339 UTC string with millisecond precision
//! (`2024-01-01T00:00:00.000Z`). Reading accepts that string form with any
//! offset, or an integral number of milliseconds, and rejects everything
//! else instead of substituting a default.

use core::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Milliseconds since the Unix epoch.
///
/// Ordering is plain numeric ordering, so timestamps can be compared
/// directly against a collection's watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

/// Error produced when a timestamp cannot be parsed or represented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The input is not a valid RFC 3339 date-time.
    #[error("invalid timestamp `{0}`")]
    Parse(String),
    /// The instant lies before the epoch or beyond the representable range.
    #[error("timestamp {0}ms is out of range")]
    OutOfRange(i128),
}

/// `9999-12-31T23:59:59.999Z`. Later years need a sign in RFC 3339.
const MAX_MILLIS: u64 = 253_402_300_799_999;

impl Timestamp {
    /// The zero value, used as the "never merged" watermark.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp from milliseconds since the epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns `true` for [`Timestamp::EPOCH`].
    pub const fn is_epoch(&self) -> bool {
        self.0 == 0
    }

    /// Parse an RFC 3339 date-time, normalizing any offset to UTC.
    pub fn parse_rfc3339(input: &str) -> Result<Self, TimestampError> {
        let parsed = DateTime::parse_from_rfc3339(input)
            .map_err(|_| TimestampError::Parse(input.to_string()))?;
        Self::try_from_signed(parsed.timestamp_millis() as i128)
    }

    /// Format as the canonical RFC 3339 string.
    pub fn to_rfc3339(&self) -> Result<String, TimestampError> {
        let millis =
            i64::try_from(self.0).map_err(|_| TimestampError::OutOfRange(self.0 as i128))?;
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .ok_or(TimestampError::OutOfRange(millis as i128))
    }

    /// Accepts `0..=MAX_MILLIS`, the instants whose RFC 3339 form parses
    /// back to the same value.
    fn try_from_signed(millis: i128) -> Result<Self, TimestampError> {
        u64::try_from(millis)
            .ok()
            .filter(|ms| *ms <= MAX_MILLIS)
            .map(Self)
            .ok_or(TimestampError::OutOfRange(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}ms", self.0),
        }
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = self.to_rfc3339().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an RFC 3339 date-time string or integral milliseconds since the epoch")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Timestamp::parse_rfc3339(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Timestamp::try_from_signed(v as i128).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Timestamp::try_from_signed(v as i128).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.is_finite() && v.fract() == 0.0 && v >= 0.0 && v <= u64::MAX as f64 {
            Timestamp::try_from_signed(v as i128).map_err(E::custom)
        } else {
            Err(E::custom(format_args!("{v} is not a valid millisecond timestamp")))
        }
    }
}
