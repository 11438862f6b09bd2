//! Play session - the composition root
//!
//! Owns the in-memory progress record and every collaborator that reads or
//! writes it. Counters shown to the player always come from here, whether
//! or not the cloud is reachable.

use std::sync::Arc;
use std::time::Duration;

use feelgood_core::{Clock, ProgressRecord};
use feelgood_store::{LocalProgress, LocalStore, RemoteStore};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    spawn_period, AchievementReporter, AchievementTracker, CheckSummary, Completion,
    SessionConfig, SyncReport, SyncService, SyncSlot, SyncStatus,
};

#[derive(Debug)]
struct SessionState {
    record: ProgressRecord,
    /// Bumped on every local mutation
    revision: u64,
    paused: bool,
}

pub struct GameSession<L, R, A>
where
    L: LocalStore,
    R: RemoteStore,
    A: AchievementReporter,
{
    local: L,
    sync: SyncService<R>,
    achievements: AchievementTracker<A>,
    clock: Arc<dyn Clock>,
    slot: SyncSlot,
    state: Mutex<SessionState>,
    config: SessionConfig,
}

impl<L, R, A> GameSession<L, R, A>
where
    L: LocalStore,
    R: RemoteStore,
    A: AchievementReporter,
{
    pub fn new(local: L, remote: Arc<R>, reporter: A, config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let sync = SyncService::new(remote, config.sync.clone(), clock.clone());
        let achievements = AchievementTracker::new(
            reporter,
            config.leaderboard_id.clone(),
            config.unlock_window,
            clock.clone(),
        );

        GameSession {
            local,
            sync,
            achievements,
            state: Mutex::new(SessionState {
                record: ProgressRecord::new(clock.now()),
                revision: 0,
                paused: false,
            }),
            clock,
            slot: SyncSlot::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local_store(&self) -> &L {
        &self.local
    }

    pub fn sync_service(&self) -> &SyncService<R> {
        &self.sync
    }

    pub fn achievements(&self) -> &AchievementTracker<A> {
        &self.achievements
    }

    pub fn sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync.subscribe()
    }

    pub fn snapshot(&self) -> ProgressRecord {
        self.state.lock().record
    }

    /// A sync request is waiting on a running or cancelled round
    pub fn sync_pending(&self) -> bool {
        self.slot.has_queued()
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Current spawn period derived from the interval setting
    pub fn spawn_period(&self) -> Duration {
        spawn_period(self.snapshot().interval)
    }

    /// Read local progress, then reconcile with the cloud
    pub async fn load(&self) -> Option<SyncReport> {
        let stored = LocalProgress::load(&self.local);
        {
            let mut state = self.state.lock();
            state.record = stored;
            state.revision += 1;
        }
        tracing::info!(
            score = stored.score,
            flowers_seen = stored.flowers_seen,
            interval = stored.interval,
            "loaded local progress"
        );
        self.sync().await
    }

    /// Count a successful tap and persist it locally
    pub fn record_tap(&self, bonus: bool) -> ProgressRecord {
        let record = self.mutate(|record, now| record.record_tap(bonus, now));
        if bonus {
            tracing::debug!(flowers_seen = record.flowers_seen, "flower seen");
        }
        record
    }

    /// Change the interval setting, clamped into range. Returns the applied value.
    pub fn set_interval(&self, interval: f64) -> f64 {
        self.mutate(|record, now| record.set_interval(interval, now))
            .interval
    }

    /// Persist locally, report achievements, then sync
    pub async fn commit(&self) -> (CheckSummary, Option<SyncReport>) {
        let record = self.snapshot();
        self.persist(&record);
        let summary = self
            .achievements
            .check(record.score, record.flowers_seen)
            .await;
        (summary, self.sync().await)
    }

    pub async fn pause(&self) -> Option<SyncReport> {
        self.state.lock().paused = true;
        self.commit().await.1
    }

    pub fn resume(&self) {
        self.state.lock().paused = false;
    }

    /// Zero the counters, restore the default interval and commit.
    ///
    /// Counters merge by max, so a reachable cloud copy brings its counters
    /// straight back; only the interval reset sticks.
    pub async fn reset(&self) -> Option<SyncReport> {
        self.mutate(|record, now| *record = ProgressRecord::new(now));
        tracing::info!("progress reset");
        self.commit().await.1
    }

    /// Reconcile with the cloud.
    ///
    /// Returns `None` when a round is already running; the request is then
    /// queued and that round repeats once against the latest local state.
    /// If the running call is cancelled first, the request stays pending
    /// and the next call picks it up.
    pub async fn sync(&self) -> Option<SyncReport> {
        let mut run = self.slot.begin()?;

        loop {
            let (snapshot, revision) = {
                let state = self.state.lock();
                (state.record, state.revision)
            };

            let report = self.sync.reconcile_with_remote(snapshot).await;
            self.adopt(&report, revision);

            if run.complete() == Completion::Done {
                return Some(report);
            }
            tracing::debug!("sync requested mid-round, running again");
        }
    }

    // A local mutation during the round keeps its interval and max-merges
    // the counters; the queued round pushes it out.
    fn adopt(&self, report: &SyncReport, snapshot_revision: u64) {
        let record = {
            let mut state = self.state.lock();
            if state.record == report.record {
                return;
            }
            if state.revision == snapshot_revision {
                state.record = report.record;
            } else {
                state.record.score = state.record.score.max(report.record.score);
                state.record.flowers_seen = state.record.flowers_seen.max(report.record.flowers_seen);
            }
            state.record
        };
        self.persist(&record);
    }

    fn mutate(&self, f: impl FnOnce(&mut ProgressRecord, feelgood_core::RecordTime)) -> ProgressRecord {
        let now = self.clock.now();
        let record = {
            let mut state = self.state.lock();
            f(&mut state.record, now);
            state.revision += 1;
            state.record
        };
        self.persist(&record);
        record
    }

    fn persist(&self, record: &ProgressRecord) {
        if let Err(e) = LocalProgress::persist(&self.local, record) {
            tracing::warn!(error = %e, "failed to persist progress locally");
        }
    }
}
