//! Hand-written collaborators for session tests

use async_trait::async_trait;
use feelgood_core::{StoreError, StoreResult};
use feelgood_runtime::{AchievementReporter, ReportError};
use feelgood_store::{LocalStore, MemoryLocalStore};
use parking_lot::Mutex;

/// Reporter that records every call
#[derive(Debug)]
pub struct RecordingReporter {
    authenticated: Mutex<bool>,
    reject: Mutex<Option<ReportError>>,
    progress: Mutex<Vec<(String, f64)>>,
    scores: Mutex<Vec<(String, u64)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        RecordingReporter {
            authenticated: Mutex::new(true),
            reject: Mutex::new(None),
            progress: Mutex::new(Vec::new()),
            scores: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_out() -> Self {
        let reporter = Self::new();
        reporter.set_authenticated(false);
        reporter
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        *self.authenticated.lock() = authenticated;
    }

    /// Fail every subsequent progress report with `error`
    pub fn reject_with(&self, error: ReportError) {
        *self.reject.lock() = Some(error);
    }

    pub fn progress_reports(&self) -> Vec<(String, f64)> {
        self.progress.lock().clone()
    }

    pub fn reports_for(&self, identifier: &str) -> Vec<f64> {
        self.progress
            .lock()
            .iter()
            .filter(|(id, _)| id == identifier)
            .map(|(_, pct)| *pct)
            .collect()
    }

    pub fn score_reports(&self) -> Vec<(String, u64)> {
        self.scores.lock().clone()
    }
}

impl Default for RecordingReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AchievementReporter for RecordingReporter {
    fn is_authenticated(&self) -> bool {
        *self.authenticated.lock()
    }

    async fn report_progress(&self, identifier: &str, percent_complete: f64) -> Result<(), ReportError> {
        self.progress
            .lock()
            .push((identifier.to_string(), percent_complete));
        match self.reject.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn report_score(&self, leaderboard: &str, score: u64) -> Result<(), ReportError> {
        self.scores.lock().push((leaderboard.to_string(), score));
        Ok(())
    }
}

/// Local store whose writes land in memory but never become durable
#[derive(Debug, Default)]
pub struct UnflushableStore {
    inner: MemoryLocalStore,
    flush_attempts: Mutex<u64>,
}

impl UnflushableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_attempts(&self) -> u64 {
        *self.flush_attempts.lock()
    }
}

impl LocalStore for UnflushableStore {
    fn get_int(&self, key: &str) -> i64 {
        self.inner.get_int(key)
    }

    fn set_int(&self, key: &str, value: i64) {
        self.inner.set_int(key, value);
    }

    fn get_float(&self, key: &str) -> f64 {
        self.inner.get_float(key)
    }

    fn set_float(&self, key: &str, value: f64) {
        self.inner.set_float(key, value);
    }

    fn flush(&self) -> StoreResult<()> {
        *self.flush_attempts.lock() += 1;
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only volume",
        )))
    }
}
