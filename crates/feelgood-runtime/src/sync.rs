//! Cloud reconciliation service

use std::sync::Arc;

use feelgood_core::{Clock, ProgressRecord, RecordTime, SyncError};
use feelgood_state::Reconciler;
use feelgood_store::{RecordGateway, RemoteStore, SyncConfig};
use parking_lot::Mutex;
use tokio::sync::watch;

/// How a reconciliation round ended
#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    /// No remote record existed; the local record was saved verbatim
    Seeded,
    /// Local and remote were merged and the merge was saved
    Merged,
    /// Seed or merge computed but the save failed; the record still advances
    SaveFailed(SyncError),
    /// Fetch failed, timed out, or another round was running; nothing merged
    Skipped(SyncError),
}

/// Record to adopt after a round, plus how the round ended
#[derive(Clone, Debug, PartialEq)]
pub struct SyncReport {
    pub record: ProgressRecord,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    fn skipped(local: ProgressRecord, error: SyncError) -> Self {
        SyncReport {
            record: local,
            outcome: SyncOutcome::Skipped(error),
        }
    }

    /// Side-channel error, if any
    pub fn error(&self) -> Option<&SyncError> {
        match &self.outcome {
            SyncOutcome::Seeded | SyncOutcome::Merged => None,
            SyncOutcome::SaveFailed(e) | SyncOutcome::Skipped(e) => Some(e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error().is_none()
    }
}

/// Observable sync state for a status indicator
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncStatus {
    pub syncing: bool,
    pub last_synced: Option<RecordTime>,
    pub last_error: Option<SyncError>,
}

/// Reconciles a local progress record with the remote copy.
///
/// Only one round runs at a time; a direct concurrent call is rejected
/// with `SyncError::Busy`. Queuing is the session's job (see `SyncSlot`).
pub struct SyncService<R: RemoteStore> {
    gateway: RecordGateway<R>,
    reconciler: Reconciler,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<bool>,
    status: watch::Sender<SyncStatus>,
}

impl<R: RemoteStore> SyncService<R> {
    pub fn new(remote: Arc<R>, config: SyncConfig, clock: Arc<dyn Clock>) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        SyncService {
            gateway: RecordGateway::with_clock(remote, config, clock.clone()),
            reconciler: Reconciler::with_clock(clock.clone()),
            clock,
            in_flight: Mutex::new(false),
            status,
        }
    }

    pub fn gateway(&self) -> &RecordGateway<R> {
        &self.gateway
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn is_syncing(&self) -> bool {
        *self.in_flight.lock()
    }

    /// Reconcile `local` with the remote record.
    ///
    /// - No remote record: save `local` and return it.
    /// - Remote record: merge, save the merge, return the merge even if the
    ///   save fails.
    /// - Fetch failure: return `local` untouched and report the error.
    pub async fn reconcile_with_remote(&self, local: ProgressRecord) -> SyncReport {
        let Some(_guard) = self.try_enter() else {
            tracing::debug!("reconciliation rejected: another round in flight");
            return SyncReport::skipped(local, SyncError::Busy);
        };

        self.status.send_modify(|s| s.syncing = true);

        let fetched = match self.gateway.fetch().await {
            Err(SyncError::RecordNotFound) => Ok(None),
            other => other,
        };

        let report = match fetched {
            Ok(None) => {
                tracing::debug!(key = %self.gateway.key(), "no remote record, seeding");
                self.save(local, SyncOutcome::Seeded).await
            }
            Ok(Some(remote)) => {
                let merged = self.reconciler.merge(&local, &remote);
                tracing::debug!(
                    local_score = local.score,
                    remote_score = remote.score,
                    merged_score = merged.score,
                    merged_flowers = merged.flowers_seen,
                    "merged with remote record"
                );
                self.save(merged, SyncOutcome::Merged).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote fetch failed, keeping local progress");
                SyncReport::skipped(local, e)
            }
        };

        self.publish(&report);
        report
    }

    async fn save(&self, record: ProgressRecord, success: SyncOutcome) -> SyncReport {
        let outcome = match self.gateway.save(&record).await {
            Ok(()) => success,
            Err(e) => {
                tracing::warn!(error = %e, "remote save failed, local progress still advances");
                SyncOutcome::SaveFailed(e)
            }
        };
        SyncReport { record, outcome }
    }

    fn publish(&self, report: &SyncReport) {
        let now = self.clock.now();
        self.status.send_modify(|s| {
            s.syncing = false;
            match report.error() {
                None => {
                    s.last_synced = Some(now);
                    s.last_error = None;
                }
                Some(e) => s.last_error = Some(e.clone()),
            }
        });

        if report.is_success() {
            tracing::info!(
                score = report.record.score,
                flowers_seen = report.record.flowers_seen,
                outcome = ?report.outcome,
                "cloud sync complete"
            );
        }
    }

    fn try_enter(&self) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock();
        if *in_flight {
            return None;
        }
        *in_flight = true;
        Some(InFlightGuard {
            flag: &self.in_flight,
        })
    }
}

struct InFlightGuard<'a> {
    flag: &'a Mutex<bool>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.flag.lock() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use feelgood_core::{decode_fields, encode_fields, ManualClock};
    use feelgood_store::{AccountStatus, MemoryRemoteStore, RemoteOp};

    const T: i64 = 1_700_000_000;

    fn setup() -> (Arc<MemoryRemoteStore>, SyncService<MemoryRemoteStore>) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let clock = Arc::new(ManualClock::new(RecordTime::from_secs(T + 10)));
        let service = SyncService::new(remote.clone(), SyncConfig::default(), clock);
        (remote, service)
    }

    fn record(score: u64, flowers: u64, interval: f64, secs: i64) -> ProgressRecord {
        ProgressRecord::with_values(score, flowers, interval, RecordTime::from_secs(secs))
    }

    #[tokio::test]
    async fn test_merge_with_newer_remote() {
        let (remote, service) = setup();
        remote.insert(
            SyncConfig::default().key(),
            encode_fields(&record(50, 10, 2.0, T)),
        );

        let report = service
            .reconcile_with_remote(record(100, 5, 1.0, T - 3600))
            .await;

        assert_eq!(report.outcome, SyncOutcome::Merged);
        assert_eq!(report.record.score, 100);
        assert_eq!(report.record.flowers_seen, 10);
        assert_eq!(report.record.interval, 2.0);
        assert_eq!(report.record.last_modified, RecordTime::from_secs(T + 10));

        let saved = decode_fields(
            &remote.get(&SyncConfig::default().key()).unwrap(),
            RecordTime::EPOCH,
        );
        assert_eq!(saved, report.record);
    }

    #[tokio::test]
    async fn test_missing_remote_seeds_local() {
        let (remote, service) = setup();
        let local = record(7, 1, 3.0, T);

        let report = service.reconcile_with_remote(local).await;

        assert_eq!(report.outcome, SyncOutcome::Seeded);
        assert_eq!(report.record, local);
        assert_eq!(remote.calls().save, 1);
        let saved = decode_fields(
            &remote.get(&SyncConfig::default().key()).unwrap(),
            RecordTime::EPOCH,
        );
        assert_eq!(saved, local);
    }

    #[tokio::test]
    async fn test_account_unavailable_returns_local_without_save() {
        let (remote, service) = setup();
        remote.set_account_status(AccountStatus::NoAccount);
        let local = record(7, 1, 3.0, T);

        let report = service.reconcile_with_remote(local).await;

        assert_eq!(report.record, local);
        assert_eq!(report.error(), Some(&SyncError::AccountUnavailable));
        assert_eq!(remote.calls().save, 0);
        assert_eq!(service.status().last_error, Some(SyncError::AccountUnavailable));
        assert!(!service.status().syncing);
    }

    #[tokio::test]
    async fn test_save_failure_still_advances() {
        let (remote, service) = setup();
        remote.insert(
            SyncConfig::default().key(),
            encode_fields(&record(500, 0, 2.0, T)),
        );
        remote.fail_next(RemoteOp::Save, SyncError::Network("dropped".into()));

        let report = service.reconcile_with_remote(record(3, 2, 1.0, T)).await;

        assert_eq!(report.record.score, 500);
        assert_eq!(report.record.flowers_seen, 2);
        assert_eq!(
            report.outcome,
            SyncOutcome::SaveFailed(SyncError::Network("dropped".into()))
        );
        assert_eq!(service.status().last_synced, None);
    }

    #[tokio::test]
    async fn test_success_updates_status() {
        let (_remote, service) = setup();
        let mut status = service.subscribe();

        service.reconcile_with_remote(record(1, 0, 1.0, T)).await;

        assert!(status.has_changed().unwrap());
        let current = status.borrow_and_update().clone();
        assert!(!current.syncing);
        assert_eq!(current.last_synced, Some(RecordTime::from_secs(T + 10)));
        assert_eq!(current.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_call_is_rejected() {
        let (remote, service) = setup();
        remote.set_latency(Duration::from_millis(200));
        let local = record(1, 0, 1.0, T);

        let (first, second) = tokio::join!(
            service.reconcile_with_remote(local),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                service.reconcile_with_remote(local).await
            }
        );

        assert!(first.is_success());
        assert_eq!(second.outcome, SyncOutcome::Skipped(SyncError::Busy));
        assert!(!service.is_syncing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_fetch_times_out() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.set_latency(Duration::from_secs(120));
        let config = SyncConfig::offline_friendly();
        let service = SyncService::new(
            remote,
            config.clone(),
            Arc::new(ManualClock::new(RecordTime::from_secs(T))),
        );
        let local = record(1, 0, 1.0, T);

        let report = service.reconcile_with_remote(local).await;

        assert_eq!(report.record, local);
        assert_eq!(report.error(), Some(&SyncError::Timeout(config.fetch_timeout)));
    }
}
