//! Progress reconciliation

use std::sync::Arc;

use feelgood_core::{Clock, ProgressRecord, RecordTime, SystemClock};
use parking_lot::Mutex;

/// Which input supplied the merged interval
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalSource {
    First,
    Second,
}

/// Merge two observations of the same progress record.
///
/// Counters take the max of both sides. The interval comes from the side
/// with the strictly newer `last_modified`; equal timestamps keep `a`.
/// The result is stamped `now` since it is a freshly reconciled state.
pub fn merge(a: &ProgressRecord, b: &ProgressRecord, now: RecordTime) -> ProgressRecord {
    merge_traced(a, b, now).0
}

fn merge_traced(
    a: &ProgressRecord,
    b: &ProgressRecord,
    now: RecordTime,
) -> (ProgressRecord, IntervalSource) {
    let source = if b.last_modified > a.last_modified {
        IntervalSource::Second
    } else {
        IntervalSource::First
    };

    let interval = match source {
        IntervalSource::First => a.interval,
        IntervalSource::Second => b.interval,
    };

    let merged = ProgressRecord {
        score: a.score.max(b.score),
        flowers_seen: a.flowers_seen.max(b.flowers_seen),
        interval,
        last_modified: now,
    };

    (merged, source)
}

/// Reconciliation counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub merges: u64,
    pub interval_from_first: u64,
    pub interval_from_second: u64,
    /// Merges where the second input raised at least one counter
    pub counters_raised: u64,
}

/// Clock-owning reconciliation engine
pub struct Reconciler {
    clock: Arc<dyn Clock>,
    stats: Mutex<ReconcileStats>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Reconciler {
            clock,
            stats: Mutex::new(ReconcileStats::default()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Merge `a` with `b`, stamping the result with the current clock time
    pub fn merge(&self, a: &ProgressRecord, b: &ProgressRecord) -> ProgressRecord {
        let (merged, source) = merge_traced(a, b, self.clock.now());

        let mut stats = self.stats.lock();
        stats.merges += 1;
        match source {
            IntervalSource::First => stats.interval_from_first += 1,
            IntervalSource::Second => stats.interval_from_second += 1,
        }
        if !a.dominates(b) {
            stats.counters_raised += 1;
        }
        drop(stats);

        tracing::trace!(
            score = merged.score,
            flowers_seen = merged.flowers_seen,
            interval = merged.interval,
            interval_source = ?source,
            "merged progress records"
        );

        merged
    }

    pub fn stats(&self) -> ReconcileStats {
        self.stats.lock().clone()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
