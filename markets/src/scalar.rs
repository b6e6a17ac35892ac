//! Fixed scalar types shared across the engine: `Price`, `Volume`, `Timestamp`, `Duration`.
//!
//! `Timestamp` and `Duration` are plain nanosecond-resolution integers over an arbitrary
//! epoch — deliberately *not* [`chrono::DateTime`], so simulated time can never be confused
//! with wall-clock time at the type level. Wall-clock stamps (e.g. on an engine run's metadata)
//! continue to use `chrono::DateTime<Utc>`.

use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Signed real price. Implemented as [`Decimal`] for exact arithmetic, matching every other
/// monetary quantity in this codebase.
pub type Price = Decimal;

/// Unsigned trade/order quantity.
pub type Volume = u64;

/// Monotonic simulated instant, nanosecond resolution, arbitrary epoch.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize, Constructor,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn nanos(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, rhs: Duration) -> Option<Timestamp> {
        self.0.checked_add(rhs.0).map(Timestamp)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Signed span of simulated time, same base unit as [`Timestamp`].
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Deserialize, Serialize, Constructor,
)]
pub struct Duration(pub i64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn from_micros(micros: i64) -> Self {
        Self(micros * 1_000)
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000_000_000)
    }

    pub fn nanos(self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_arithmetic() {
        let t = Timestamp(100);
        let d = Duration::from_nanos(50);
        assert_eq!(t + d, Timestamp(150));
        assert_eq!((t + d) - t, d);
    }

    #[test]
    fn duration_unit_constructors() {
        assert_eq!(Duration::from_secs(1), Duration(1_000_000_000));
        assert_eq!(Duration::from_millis(1), Duration(1_000_000));
        assert_eq!(Duration::from_micros(1), Duration(1_000));
    }

    #[test]
    fn timestamp_ordering_is_numeric() {
        assert!(Timestamp(1) < Timestamp(2));
    }
}
