//! Achievement and leaderboard reporting

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feelgood_core::{Clock, RecordTime};
use parking_lot::Mutex;
use thiserror::Error;

/// Percent value of a completed achievement
pub const COMPLETE: f64 = 100.0;

/// Fixed ascending table of milestone thresholds
#[derive(Clone, Debug, PartialEq)]
pub struct AchievementTable {
    entries: Vec<(u64, String)>,
}

impl AchievementTable {
    /// Build a table. Entries are sorted; zero thresholds are dropped.
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (u64, S)>) -> Self {
        let mut entries: Vec<(u64, String)> = entries
            .into_iter()
            .filter(|(threshold, _)| *threshold > 0)
            .map(|(threshold, id)| (threshold, id.into()))
            .collect();
        entries.sort_by_key(|(threshold, _)| *threshold);
        AchievementTable { entries }
    }

    /// Tap-count milestones
    pub fn score() -> Self {
        Self::new([
            (100, "achievement_100_taps"),
            (500, "achievement_500_taps"),
            (1_000, "achievement_1000_taps"),
            (5_000, "achievement_5000_taps"),
            (10_000, "achievement_10000_taps"),
            (50_000, "achievement_50000_taps"),
            (100_000, "achievement_100000_taps"),
            (500_000, "achievement_500000_taps"),
        ])
    }

    /// Flower-count milestones
    pub fn flowers() -> Self {
        Self::new([(10, "flowers_10"), (50, "flowers_50"), (100, "flowers_100")])
    }

    /// Identifier of the highest threshold `count` has reached
    pub fn identifier_for_count(&self, count: u64) -> Option<&str> {
        self.entries
            .iter()
            .take_while(|(threshold, _)| count >= *threshold)
            .last()
            .map(|(_, id)| id.as_str())
    }

    /// Percent complete of every entry at `count`, capped at 100
    pub fn progress(&self, count: u64) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(move |(threshold, id)| {
            let percent = (count as f64 * 100.0 / *threshold as f64).min(COMPLETE);
            (id.as_str(), percent)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("Player is not authenticated")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Report rejected: {0}")]
    Rejected(String),
}

/// Platform game-services reporting
#[async_trait]
pub trait AchievementReporter: Send + Sync {
    fn is_authenticated(&self) -> bool;

    async fn report_progress(&self, identifier: &str, percent_complete: f64) -> Result<(), ReportError>;

    async fn report_score(&self, leaderboard: &str, score: u64) -> Result<(), ReportError>;
}

/// Reporter that only logs; used when no game service is connected
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

#[async_trait]
impl AchievementReporter for LogReporter {
    fn is_authenticated(&self) -> bool {
        true
    }

    async fn report_progress(&self, identifier: &str, percent_complete: f64) -> Result<(), ReportError> {
        tracing::debug!(identifier, percent_complete, "achievement progress");
        Ok(())
    }

    async fn report_score(&self, leaderboard: &str, score: u64) -> Result<(), ReportError> {
        tracing::debug!(leaderboard, score, "leaderboard score");
        Ok(())
    }
}

/// Summary of one achievement check
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckSummary {
    /// Progress reports sent
    pub reported: usize,
    /// Identifiers that reached 100 during this check
    pub newly_completed: Vec<String>,
    /// Reports the service refused or failed to deliver
    pub failed: usize,
}

/// Decides which achievements to report and suppresses completed ones.
///
/// The local progress map is updated before reporting, so a completed
/// identifier is reported at 100 exactly once per tracker.
pub struct AchievementTracker<A: AchievementReporter> {
    reporter: A,
    score_table: AchievementTable,
    flower_table: AchievementTable,
    leaderboard: String,
    progress: Mutex<HashMap<String, f64>>,
    unlocked: Mutex<Vec<(String, RecordTime)>>,
    unlock_window: Duration,
    clock: Arc<dyn Clock>,
}

impl<A: AchievementReporter> AchievementTracker<A> {
    pub fn new(
        reporter: A,
        leaderboard: impl Into<String>,
        unlock_window: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_tables(
            reporter,
            AchievementTable::score(),
            AchievementTable::flowers(),
            leaderboard,
            unlock_window,
            clock,
        )
    }

    pub fn with_tables(
        reporter: A,
        score_table: AchievementTable,
        flower_table: AchievementTable,
        leaderboard: impl Into<String>,
        unlock_window: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        AchievementTracker {
            reporter,
            score_table,
            flower_table,
            leaderboard: leaderboard.into(),
            progress: Mutex::new(HashMap::new()),
            unlocked: Mutex::new(Vec::new()),
            unlock_window,
            clock,
        }
    }

    pub fn reporter(&self) -> &A {
        &self.reporter
    }

    /// Load progress already known to the game service
    pub fn seed<S: Into<String>>(&self, known: impl IntoIterator<Item = (S, f64)>) {
        let mut progress = self.progress.lock();
        for (id, percent) in known {
            progress.insert(id.into(), percent);
        }
    }

    pub fn progress_of(&self, identifier: &str) -> f64 {
        self.progress.lock().get(identifier).copied().unwrap_or(0.0)
    }

    /// Identifiers completed within the unlock window
    pub fn recently_unlocked(&self) -> Vec<String> {
        let cutoff = self.clock.now().saturating_sub(self.unlock_window);
        let mut unlocked = self.unlocked.lock();
        unlocked.retain(|(_, at)| *at >= cutoff);
        unlocked.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Report score and flower progress plus the leaderboard score
    pub async fn check(&self, score: u64, flowers_seen: u64) -> CheckSummary {
        let mut summary = CheckSummary::default();
        if !self.reporter.is_authenticated() {
            tracing::debug!("not reporting achievements: player not authenticated");
            return summary;
        }

        if let Err(e) = self.reporter.report_score(&self.leaderboard, score).await {
            tracing::warn!(error = %e, leaderboard = %self.leaderboard, "score report failed");
        }

        let pending = self.plan(score, flowers_seen, &mut summary);
        for (identifier, percent) in pending {
            summary.reported += 1;
            if let Err(e) = self.reporter.report_progress(&identifier, percent).await {
                summary.failed += 1;
                tracing::warn!(error = %e, %identifier, "achievement report failed");
            }
        }

        for identifier in &summary.newly_completed {
            tracing::info!(%identifier, "achievement unlocked");
        }
        summary
    }

    fn plan(&self, score: u64, flowers_seen: u64, summary: &mut CheckSummary) -> Vec<(String, f64)> {
        let now = self.clock.now();
        let mut progress = self.progress.lock();
        let mut pending = Vec::new();

        let candidates = self
            .score_table
            .progress(score)
            .chain(self.flower_table.progress(flowers_seen));

        for (identifier, percent) in candidates {
            let previous = progress.get(identifier).copied().unwrap_or(0.0);
            if previous >= COMPLETE {
                continue;
            }
            if percent >= COMPLETE {
                summary.newly_completed.push(identifier.to_string());
            }
            progress.insert(identifier.to_string(), percent);
            pending.push((identifier.to_string(), percent));
        }
        drop(progress);

        if !summary.newly_completed.is_empty() {
            let mut unlocked = self.unlocked.lock();
            for id in &summary.newly_completed {
                unlocked.push((id.clone(), now));
            }
        }
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feelgood_core::ManualClock;

    #[derive(Default)]
    struct Recording {
        authenticated: bool,
        progress: Mutex<Vec<(String, f64)>>,
        scores: Mutex<Vec<u64>>,
    }

    impl Recording {
        fn signed_in() -> Self {
            Recording {
                authenticated: true,
                ..Default::default()
            }
        }

        fn reports_for(&self, id: &str) -> Vec<f64> {
            self.progress
                .lock()
                .iter()
                .filter(|(i, _)| i == id)
                .map(|(_, p)| *p)
                .collect()
        }
    }

    #[async_trait]
    impl AchievementReporter for Recording {
        fn is_authenticated(&self) -> bool {
            self.authenticated
        }

        async fn report_progress(&self, identifier: &str, percent: f64) -> Result<(), ReportError> {
            self.progress.lock().push((identifier.to_string(), percent));
            Ok(())
        }

        async fn report_score(&self, _leaderboard: &str, score: u64) -> Result<(), ReportError> {
            self.scores.lock().push(score);
            Ok(())
        }
    }

    fn tracker(reporter: Recording, clock: Arc<ManualClock>) -> AchievementTracker<Recording> {
        AchievementTracker::new(reporter, "main_leaderboard", Duration::from_secs(30), clock)
    }

    #[test]
    fn test_identifier_for_count() {
        let table = AchievementTable::score();
        assert_eq!(table.identifier_for_count(99), None);
        assert_eq!(table.identifier_for_count(100), Some("achievement_100_taps"));
        assert_eq!(table.identifier_for_count(4_999), Some("achievement_1000_taps"));
        assert_eq!(table.identifier_for_count(u64::MAX), Some("achievement_500000_taps"));
    }

    #[test]
    fn test_table_sorts_and_drops_zero() {
        let table = AchievementTable::new([(50, "b"), (0, "zero"), (10, "a")]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.identifier_for_count(20), Some("a"));
    }

    #[test]
    fn test_progress_caps_at_complete() {
        let table = AchievementTable::flowers();
        let progress: Vec<_> = table.progress(25).collect();
        assert_eq!(progress[0], ("flowers_10", 100.0));
        assert_eq!(progress[1], ("flowers_50", 50.0));
        assert_eq!(progress[2], ("flowers_100", 25.0));
    }

    #[tokio::test]
    async fn test_completion_reported_once() {
        let clock = Arc::new(ManualClock::new(RecordTime::from_secs(1)));
        let tracker = tracker(Recording::signed_in(), clock);

        tracker.check(99, 0).await;
        let summary = tracker.check(100, 0).await;
        assert_eq!(summary.newly_completed, vec!["achievement_100_taps".to_string()]);
        tracker.check(100, 0).await;

        let reports = tracker.reporter().reports_for("achievement_100_taps");
        assert_eq!(reports.iter().filter(|p| **p >= COMPLETE).count(), 1);
        assert_eq!(reports, vec![99.0, 100.0]);
        assert_eq!(tracker.progress_of("achievement_100_taps"), COMPLETE);
    }

    #[tokio::test]
    async fn test_unauthenticated_reports_nothing() {
        let clock = Arc::new(ManualClock::new(RecordTime::from_secs(1)));
        let tracker = tracker(Recording::default(), clock);

        let summary = tracker.check(1_000, 100).await;
        assert_eq!(summary, CheckSummary::default());
        assert!(tracker.reporter().scores.lock().is_empty());
    }

    #[tokio::test]
    async fn test_seeded_progress_suppresses_reports() {
        let clock = Arc::new(ManualClock::new(RecordTime::from_secs(1)));
        let tracker = tracker(Recording::signed_in(), clock);
        tracker.seed([("flowers_10", 100.0)]);

        tracker.check(0, 12).await;
        assert!(tracker.reporter().reports_for("flowers_10").is_empty());
        assert_eq!(tracker.reporter().scores.lock().as_slice(), &[0]);
    }

    #[tokio::test]
    async fn test_recently_unlocked_expires() {
        let clock = Arc::new(ManualClock::new(RecordTime::from_secs(1)));
        let tracker = tracker(Recording::signed_in(), clock.clone());

        tracker.check(0, 10).await;
        assert_eq!(tracker.recently_unlocked(), vec!["flowers_10".to_string()]);

        clock.advance(Duration::from_secs(31));
        assert!(tracker.recently_unlocked().is_empty());
    }
}
