//! Wall-clock time for progress records
//!
//! Records carry a `RecordTime` stamped on every local mutation. It is only
//! used to arbitrate the interval setting during a merge, so millisecond
//! resolution since the Unix epoch is plenty.

use std::ops::{Add, Sub};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RecordTime(pub i64);

impl RecordTime {
    pub const EPOCH: RecordTime = RecordTime(0);

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        RecordTime(millis)
    }

    #[inline]
    pub fn from_secs(secs: i64) -> Self {
        RecordTime(secs.saturating_mul(1000))
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Current system time. Clocks before the epoch read as the epoch.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(duration_millis)
            .unwrap_or(0);
        RecordTime(millis)
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        RecordTime(self.0.saturating_add(duration_millis(duration)))
    }

    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        RecordTime(self.0.saturating_sub(duration_millis(duration)))
    }
}

// Durations beyond i64 milliseconds saturate
#[inline]
fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

impl Add<Duration> for RecordTime {
    type Output = RecordTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<Duration> for RecordTime {
    type Output = RecordTime;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sub<RecordTime> for RecordTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: RecordTime) -> Self::Output {
        let diff = self.0.saturating_sub(rhs.0);
        if diff >= 0 {
            Duration::from_millis(diff as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for RecordTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({}ms)", self.0)
    }
}

impl std::fmt::Display for RecordTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> RecordTime;
}

/// Clock backed by `SystemTime`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> RecordTime {
        RecordTime::now()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    value: Mutex<RecordTime>,
}

impl ManualClock {
    pub fn new(start: RecordTime) -> Self {
        ManualClock {
            value: Mutex::new(start),
        }
    }

    pub fn set(&self, t: RecordTime) {
        *self.value.lock() = t;
    }

    pub fn advance(&self, dt: Duration) -> RecordTime {
        let mut value = self.value.lock();
        *value = value.saturating_add(dt);
        *value
    }
}

impl Clock for ManualClock {
    fn now(&self) -> RecordTime {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_time_arithmetic() {
        let t = RecordTime::from_secs(10);
        assert_eq!((t + Duration::from_millis(250)).as_millis(), 10_250);
        assert_eq!((t - Duration::from_secs(1)).as_millis(), 9_000);
        assert_eq!(t - RecordTime::from_secs(4), Duration::from_secs(6));
        // Negative differences clamp to zero
        assert_eq!(RecordTime::from_secs(4) - t, Duration::ZERO);
    }

    #[test]
    fn test_huge_duration_saturates() {
        let t = RecordTime::from_secs(1_700_000_000);
        let huge = Duration::from_secs(u64::MAX / 2);
        assert_eq!(t - huge, RecordTime(t.0 - i64::MAX));
        assert!(t - huge < t);
        assert_eq!(t + huge, RecordTime(i64::MAX));
    }

    #[test]
    fn test_record_time_ordering() {
        assert!(RecordTime::from_millis(5) > RecordTime::from_millis(4));
        assert_eq!(RecordTime::from_secs(2), RecordTime::from_millis(2000));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(RecordTime::from_secs(100));
        assert_eq!(clock.now(), RecordTime::from_secs(100));
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), RecordTime::from_secs(105));
        clock.set(RecordTime::EPOCH);
        assert_eq!(clock.now(), RecordTime::EPOCH);
    }

    #[test]
    fn test_system_clock_is_after_epoch() {
        assert!(SystemClock.now() > RecordTime::EPOCH);
    }
}
