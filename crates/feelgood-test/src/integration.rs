//! Multi-device convergence suite
//!
//! Several devices play against one shared remote record:
//! - Random taps, bonus hits and interval changes per round
//! - Commits through a flaky remote
//! - A calm final phase in which every device syncs again
//!
//! Checked afterwards: counters never decreased anywhere, and every device
//! ends on the same record as the remote.

use std::sync::Arc;
use std::time::Duration;

use feelgood_core::{decode_fields, Clock, ManualClock, ProgressRecord, RecordTime};
use feelgood_runtime::{GameSession, SessionConfig};
use feelgood_store::MemoryLocalStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chaos::{ChaosConfig, ChaosStats, FlakyRemote};
use crate::doubles::RecordingReporter;

pub type SimulatedSession = GameSession<MemoryLocalStore, FlakyRemote, RecordingReporter>;

/// Convergence run configuration
#[derive(Clone, Debug)]
pub struct ConvergenceConfig {
    pub devices: usize,
    pub rounds: usize,
    /// Upper bound of taps a device plays between commits
    pub max_taps_per_round: u32,
    pub bonus_probability: f64,
    /// Probability a round also changes the interval setting
    pub interval_change_prob: f64,
    pub chaos: ChaosConfig,
    pub seed: u64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        ConvergenceConfig {
            devices: 3,
            rounds: 60,
            max_taps_per_round: 25,
            bonus_probability: 0.2,
            interval_change_prob: 0.15,
            chaos: ChaosConfig::default(),
            seed: 42,
        }
    }
}

impl ConvergenceConfig {
    pub fn calm() -> Self {
        ConvergenceConfig {
            chaos: ChaosConfig::calm(),
            ..Self::default()
        }
    }

    pub fn hostile() -> Self {
        ConvergenceConfig {
            devices: 5,
            rounds: 120,
            chaos: ChaosConfig::hostile(),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.chaos.seed = seed.wrapping_mul(31).wrapping_add(7);
        self
    }
}

/// Outcome of a convergence run
#[derive(Clone, Debug)]
pub struct ConvergenceResult {
    pub converged: bool,
    /// Every device and the remote hold the same counters and interval
    pub final_records: Vec<ProgressRecord>,
    pub remote: Option<ProgressRecord>,
    /// Highest counters any device ever showed
    pub peak_score: u64,
    pub peak_flowers: u64,
    pub failed_syncs: usize,
    pub chaos: ChaosStats,
    pub violations: Vec<String>,
}

impl ConvergenceResult {
    pub fn is_ok(&self) -> bool {
        self.converged && self.violations.is_empty()
    }
}

/// Drives several sessions against one flaky remote
pub struct ConvergenceHarness {
    config: ConvergenceConfig,
    remote: Arc<FlakyRemote>,
    clock: Arc<ManualClock>,
    devices: Vec<SimulatedSession>,
    rng: StdRng,
    /// Last counters observed per device
    observed: Vec<(u64, u64)>,
    remote_observed: (u64, u64),
    violations: Vec<String>,
    failed_syncs: usize,
}

impl ConvergenceHarness {
    pub fn new(config: ConvergenceConfig) -> Self {
        let remote = Arc::new(FlakyRemote::new(config.chaos.clone()));
        let clock = Arc::new(ManualClock::new(RecordTime::from_secs(1_700_000_000)));

        let devices = (0..config.devices)
            .map(|_| {
                GameSession::new(
                    MemoryLocalStore::new(),
                    remote.clone(),
                    RecordingReporter::new(),
                    SessionConfig::default(),
                    clock.clone(),
                )
            })
            .collect();

        ConvergenceHarness {
            rng: StdRng::seed_from_u64(config.seed),
            observed: vec![(0, 0); config.devices],
            remote_observed: (0, 0),
            config,
            remote,
            clock,
            devices,
            violations: Vec::new(),
            failed_syncs: 0,
        }
    }

    pub fn devices(&self) -> &[SimulatedSession] {
        &self.devices
    }

    pub fn remote(&self) -> &Arc<FlakyRemote> {
        &self.remote
    }

    pub async fn run(&mut self) -> ConvergenceResult {
        if self.devices.is_empty() {
            self.violations.push("no devices configured".to_string());
            return self.finish();
        }

        for i in 0..self.devices.len() {
            if let Some(report) = self.devices[i].load().await {
                self.note_report(report.is_success());
            }
            self.observe(i);
        }

        for _ in 0..self.config.rounds {
            self.play_round().await;
        }

        // Network heals; two passes let the newest interval reach everyone
        self.remote.set_config(ChaosConfig::calm());
        for _ in 0..2 {
            for i in 0..self.devices.len() {
                self.clock.advance(Duration::from_secs(1));
                if let Some(report) = self.devices[i].sync().await {
                    self.note_report(report.is_success());
                }
                self.observe(i);
            }
        }

        self.finish()
    }

    async fn play_round(&mut self) {
        let idx = self.rng.gen_range(0..self.devices.len());
        let taps = self.rng.gen_range(0..=self.config.max_taps_per_round);

        self.clock
            .advance(Duration::from_secs(self.rng.gen_range(1..=90)));
        for _ in 0..taps {
            let bonus = self.rng.gen_bool(self.config.bonus_probability);
            self.devices[idx].record_tap(bonus);
        }
        if self.rng.gen_bool(self.config.interval_change_prob) {
            let interval = self.rng.gen_range(0.1..=5.0);
            self.devices[idx].set_interval(interval);
        }

        let (_, report) = self.devices[idx].commit().await;
        if let Some(report) = report {
            self.note_report(report.is_success());
        }
        self.observe(idx);
    }

    fn note_report(&mut self, success: bool) {
        if !success {
            self.failed_syncs += 1;
        }
    }

    fn observe(&mut self, idx: usize) {
        let record = self.devices[idx].snapshot();
        let (score, flowers) = self.observed[idx];
        if record.score < score || record.flowers_seen < flowers {
            self.violations.push(format!(
                "device {} went from ({}, {}) to ({}, {})",
                idx, score, flowers, record.score, record.flowers_seen
            ));
        }
        self.observed[idx] = (record.score, record.flowers_seen);

        if let Some(remote) = self.remote_record() {
            let (score, flowers) = self.remote_observed;
            if remote.score < score || remote.flowers_seen < flowers {
                self.violations.push(format!(
                    "remote went from ({}, {}) to ({}, {})",
                    score, flowers, remote.score, remote.flowers_seen
                ));
            }
            self.remote_observed = (remote.score, remote.flowers_seen);
        }
    }

    fn remote_record(&self) -> Option<ProgressRecord> {
        let key = SessionConfig::default().sync.key();
        self.remote
            .inner()
            .get(&key)
            .map(|fields| decode_fields(&fields, self.clock.now()))
    }

    fn finish(&mut self) -> ConvergenceResult {
        let final_records: Vec<ProgressRecord> = self.devices.iter().map(|d| d.snapshot()).collect();
        let remote = self.remote_record();

        let peak_score = self.observed.iter().map(|o| o.0).max().unwrap_or(0);
        let peak_flowers = self.observed.iter().map(|o| o.1).max().unwrap_or(0);

        let converged = match remote {
            Some(remote) => final_records.iter().all(|r| {
                r.score == remote.score
                    && r.flowers_seen == remote.flowers_seen
                    && r.interval == remote.interval
            }),
            None => false,
        };

        if let Some(remote) = remote {
            if remote.score != peak_score || remote.flowers_seen != peak_flowers {
                self.violations.push(format!(
                    "remote ({}, {}) below peak ({}, {})",
                    remote.score, remote.flowers_seen, peak_score, peak_flowers
                ));
            }
        }

        tracing::debug!(
            converged,
            peak_score,
            peak_flowers,
            failed_syncs = self.failed_syncs,
            "convergence run finished"
        );

        ConvergenceResult {
            converged,
            final_records,
            remote,
            peak_score,
            peak_flowers,
            failed_syncs: self.failed_syncs,
            chaos: self.remote.stats(),
            violations: self.violations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doubles::UnflushableStore;
    use feelgood_runtime::{LogReporter, SyncOutcome};
    use feelgood_store::{AccountStatus, MemoryRemoteStore};

    #[tokio::test(start_paused = true)]
    async fn test_calm_network_converges() {
        let result = ConvergenceHarness::new(ConvergenceConfig::calm()).run().await;

        assert!(result.is_ok(), "{:?}", result.violations);
        assert_eq!(result.failed_syncs, 0);
        assert!(result.peak_score > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_network_never_loses_counters() {
        let result = ConvergenceHarness::new(ConvergenceConfig::default()).run().await;

        assert!(result.is_ok(), "{:?}", result.violations);
        assert!(result.chaos.failures > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hostile_network_converges_after_healing() {
        let result = ConvergenceHarness::new(ConvergenceConfig::hostile()).run().await;

        assert!(result.is_ok(), "{:?}", result.violations);
        assert!(result.failed_syncs > 0);
        assert!(result.chaos.stalls > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_devices_is_rejected() {
        let config = ConvergenceConfig {
            devices: 0,
            ..ConvergenceConfig::calm()
        };
        let mut harness = ConvergenceHarness::new(config);
        let result = harness.run().await;

        assert!(!result.is_ok());
        assert!(result.final_records.is_empty());
        assert_eq!(result.violations, vec!["no devices configured".to_string()]);
        assert_eq!(harness.remote().inner().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_seeds() {
        for seed in 0..8 {
            let config = ConvergenceConfig {
                rounds: 30,
                chaos: ChaosConfig::poor(),
                ..ConvergenceConfig::default()
            }
            .with_seed(seed);

            let result = ConvergenceHarness::new(config).run().await;
            assert!(result.is_ok(), "seed {}: {:?}", seed, result.violations);
        }
    }

    fn session_with<R: feelgood_store::RemoteStore>(
        remote: Arc<R>,
        reporter: RecordingReporter,
    ) -> GameSession<MemoryLocalStore, R, RecordingReporter> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(RecordTime::from_secs(10)));
        GameSession::new(
            MemoryLocalStore::new(),
            remote,
            reporter,
            SessionConfig::default(),
            clock,
        )
    }

    #[tokio::test]
    async fn test_commit_reports_first_score_achievement_once() {
        let session = session_with(Arc::new(MemoryRemoteStore::new()), RecordingReporter::new());

        for _ in 0..99 {
            session.record_tap(false);
        }
        session.commit().await;
        session.record_tap(false);
        session.commit().await;
        session.record_tap(false);
        session.commit().await;

        let reporter = session.achievements().reporter();
        assert_eq!(reporter.reports_for("achievement_100_taps"), vec![99.0, 100.0]);
        assert_eq!(
            reporter.score_reports().last(),
            Some(&("main_leaderboard".to_string(), 101))
        );
        assert!(session
            .achievements()
            .recently_unlocked()
            .contains(&"achievement_100_taps".to_string()));
    }

    #[tokio::test]
    async fn test_signed_out_player_is_not_reported() {
        let session = session_with(Arc::new(MemoryRemoteStore::new()), RecordingReporter::signed_out());
        session.record_tap(true);

        let (summary, report) = session.commit().await;
        assert_eq!(summary.reported, 0);
        assert!(session.achievements().reporter().score_reports().is_empty());
        assert_eq!(report.map(|r| r.outcome), Some(SyncOutcome::Seeded));
    }

    #[tokio::test]
    async fn test_unwritable_local_store_keeps_playing() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.set_account_status(AccountStatus::Restricted);
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(RecordTime::from_secs(10)));
        let session = GameSession::new(
            UnflushableStore::new(),
            remote,
            LogReporter,
            SessionConfig::default(),
            clock,
        );

        session.record_tap(false);
        session.record_tap(false);
        session.commit().await;

        assert_eq!(session.snapshot().score, 2);
        assert!(session.local_store().flush_attempts() >= 3);
    }
}
