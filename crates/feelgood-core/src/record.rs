//! Progress record - the unit of persisted and synchronized state

use serde::{Deserialize, Serialize};

use crate::RecordTime;

/// Lower bound of the spawn interval setting (seconds)
pub const MIN_INTERVAL: f64 = 0.1;

/// Upper bound of the spawn interval setting (seconds)
pub const MAX_INTERVAL: f64 = 5.0;

/// Interval used on first launch and whenever a stored value is unusable
pub const DEFAULT_INTERVAL: f64 = 2.0;

/// Returns `interval` if it lies in `[MIN_INTERVAL, MAX_INTERVAL]`,
/// otherwise `DEFAULT_INTERVAL`. NaN and infinities are unusable.
#[inline]
pub fn sanitize_interval(interval: f64) -> f64 {
    if is_valid_interval(interval) {
        interval
    } else {
        DEFAULT_INTERVAL
    }
}

/// Clamp a user-requested interval into range. NaN maps to the default.
#[inline]
pub fn clamp_interval(interval: f64) -> f64 {
    if interval.is_nan() {
        DEFAULT_INTERVAL
    } else {
        interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
    }
}

#[inline]
pub fn is_valid_interval(interval: f64) -> bool {
    (MIN_INTERVAL..=MAX_INTERVAL).contains(&interval)
}

/// Score, flower count and interval setting for one player.
///
/// Counters only ever grow under correct merge behavior. `last_modified`
/// arbitrates `interval` during a merge and nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub score: u64,
    pub flowers_seen: u64,
    pub interval: f64,
    pub last_modified: RecordTime,
}

impl ProgressRecord {
    /// Fresh record: zero counters, default interval
    pub fn new(now: RecordTime) -> Self {
        ProgressRecord {
            score: 0,
            flowers_seen: 0,
            interval: DEFAULT_INTERVAL,
            last_modified: now,
        }
    }

    pub fn with_values(score: u64, flowers_seen: u64, interval: f64, last_modified: RecordTime) -> Self {
        ProgressRecord {
            score,
            flowers_seen,
            interval,
            last_modified,
        }
    }

    /// Copy of this record with the interval reset to the default if out of range
    pub fn sanitized(mut self) -> Self {
        self.interval = sanitize_interval(self.interval);
        self
    }

    pub fn has_valid_interval(&self) -> bool {
        is_valid_interval(self.interval)
    }

    /// Successful tap. A bonus tap also counts a flower.
    pub fn record_tap(&mut self, bonus: bool, now: RecordTime) {
        self.score = self.score.saturating_add(1);
        if bonus {
            self.flowers_seen = self.flowers_seen.saturating_add(1);
        }
        self.last_modified = now;
    }

    pub fn set_interval(&mut self, interval: f64, now: RecordTime) {
        self.interval = clamp_interval(interval);
        self.last_modified = now;
    }

    /// True when neither counter of `self` is below the matching counter of `other`
    pub fn dominates(&self, other: &ProgressRecord) -> bool {
        self.score >= other.score && self.flowers_seen >= other.flowers_seen
    }
}

impl Default for ProgressRecord {
    fn default() -> Self {
        ProgressRecord::new(RecordTime::EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_interval() {
        assert_eq!(sanitize_interval(1.5), 1.5);
        assert_eq!(sanitize_interval(MIN_INTERVAL), MIN_INTERVAL);
        assert_eq!(sanitize_interval(MAX_INTERVAL), MAX_INTERVAL);
        assert_eq!(sanitize_interval(0.0), DEFAULT_INTERVAL);
        assert_eq!(sanitize_interval(5.01), DEFAULT_INTERVAL);
        assert_eq!(sanitize_interval(-3.0), DEFAULT_INTERVAL);
        assert_eq!(sanitize_interval(f64::NAN), DEFAULT_INTERVAL);
        assert_eq!(sanitize_interval(f64::INFINITY), DEFAULT_INTERVAL);
    }

    #[test]
    fn test_clamp_interval() {
        assert_eq!(clamp_interval(0.01), MIN_INTERVAL);
        assert_eq!(clamp_interval(9.0), MAX_INTERVAL);
        assert_eq!(clamp_interval(3.0), 3.0);
        assert_eq!(clamp_interval(f64::NAN), DEFAULT_INTERVAL);
    }

    #[test]
    fn test_record_tap() {
        let mut record = ProgressRecord::new(RecordTime::EPOCH);
        record.record_tap(false, RecordTime::from_secs(1));
        record.record_tap(true, RecordTime::from_secs(2));

        assert_eq!(record.score, 2);
        assert_eq!(record.flowers_seen, 1);
        assert_eq!(record.last_modified, RecordTime::from_secs(2));
    }

    #[test]
    fn test_sanitized_record() {
        let record = ProgressRecord::with_values(3, 1, 12.0, RecordTime::EPOCH).sanitized();
        assert_eq!(record.interval, DEFAULT_INTERVAL);
        assert_eq!(record.score, 3);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ProgressRecord::with_values(7, 2, 1.0, RecordTime::from_millis(42));
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["flowersSeen"], 2);
        assert_eq!(json["lastModified"], 42);
    }
}
