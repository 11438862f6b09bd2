//! Chaos testing for cloud sync
//!
//! Wraps the in-memory remote with hostile conditions:
//! - Random network failures per operation
//! - Jittered latency
//! - Stalls longer than any sane deadline

use std::time::Duration;

use async_trait::async_trait;
use feelgood_core::{RecordFields, SyncError, SyncResult};
use feelgood_store::{AccountStatus, MemoryRemoteStore, RecordKey, RemoteStore};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Remote chaos configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ChaosConfig {
    /// Probability that an operation fails with a network error (0.0 - 1.0)
    pub failure_rate: f64,
    /// Probability that an operation stalls for `stall`
    pub stall_rate: f64,
    /// Stall duration
    pub stall: Duration,
    /// Latency range in milliseconds
    pub latency_ms: (u64, u64),
    /// Random seed
    pub seed: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            failure_rate: 0.1,
            stall_rate: 0.0,
            stall: Duration::from_secs(30),
            latency_ms: (10, 80),
            seed: 42,
        }
    }
}

impl ChaosConfig {
    /// No chaos at all
    pub fn calm() -> Self {
        ChaosConfig {
            failure_rate: 0.0,
            stall_rate: 0.0,
            latency_ms: (0, 0),
            ..Self::default()
        }
    }

    /// Patchy cellular connection
    pub fn poor() -> Self {
        ChaosConfig {
            failure_rate: 0.3,
            stall_rate: 0.05,
            latency_ms: (100, 600),
            ..Self::default()
        }
    }

    /// Most operations fail
    pub fn hostile() -> Self {
        ChaosConfig {
            failure_rate: 0.7,
            stall_rate: 0.1,
            latency_ms: (200, 2_000),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Counters of injected faults
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub operations: u64,
    pub failures: u64,
    pub stalls: u64,
}

/// Remote store with seeded faults in front of a `MemoryRemoteStore`
#[derive(Debug)]
pub struct FlakyRemote {
    inner: MemoryRemoteStore,
    config: Mutex<ChaosConfig>,
    rng: Mutex<StdRng>,
    stats: Mutex<ChaosStats>,
}

enum Fault {
    None(Duration),
    Fail(Duration),
    Stall(Duration),
}

impl FlakyRemote {
    pub fn new(config: ChaosConfig) -> Self {
        FlakyRemote {
            inner: MemoryRemoteStore::new(),
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config: Mutex::new(config),
            stats: Mutex::new(ChaosStats::default()),
        }
    }

    pub fn inner(&self) -> &MemoryRemoteStore {
        &self.inner
    }

    /// Swap the fault profile; the random stream continues
    pub fn set_config(&self, config: ChaosConfig) {
        *self.config.lock() = config;
    }

    pub fn stats(&self) -> ChaosStats {
        self.stats.lock().clone()
    }

    fn draw(&self) -> Fault {
        let config = self.config.lock().clone();
        let mut rng = self.rng.lock();
        let mut stats = self.stats.lock();
        stats.operations += 1;

        let (lo, hi) = config.latency_ms;
        let latency = Duration::from_millis(if hi > lo { rng.gen_range(lo..=hi) } else { lo });

        if rng.gen_bool(config.stall_rate.clamp(0.0, 1.0)) {
            stats.stalls += 1;
            Fault::Stall(config.stall)
        } else if rng.gen_bool(config.failure_rate.clamp(0.0, 1.0)) {
            stats.failures += 1;
            Fault::Fail(latency)
        } else {
            Fault::None(latency)
        }
    }

    async fn enter(&self, op: &str) -> SyncResult<()> {
        let delay = match self.draw() {
            Fault::None(d) => d,
            Fault::Stall(d) => {
                tracing::trace!(op, ?d, "injected stall");
                d
            }
            Fault::Fail(d) => {
                sleep(d).await;
                tracing::trace!(op, "injected failure");
                return Err(SyncError::Network(format!("injected {} failure", op)));
            }
        };
        sleep(delay).await;
        Ok(())
    }
}

async fn sleep(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

#[async_trait]
impl RemoteStore for FlakyRemote {
    async fn account_status(&self) -> SyncResult<AccountStatus> {
        self.enter("account").await?;
        self.inner.account_status().await
    }

    async fn fetch_by_key(&self, key: &RecordKey) -> SyncResult<RecordFields> {
        self.enter("fetch").await?;
        self.inner.fetch_by_key(key).await
    }

    async fn query_first(&self, record_type: &str) -> SyncResult<Option<RecordFields>> {
        self.enter("query").await?;
        self.inner.query_first(record_type).await
    }

    async fn save(&self, key: &RecordKey, fields: RecordFields) -> SyncResult<()> {
        self.enter("save").await?;
        self.inner.save(key, fields).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RecordKey {
        RecordKey::new("GameState", "FeelGoodGameState")
    }

    #[tokio::test(start_paused = true)]
    async fn test_calm_never_fails() {
        let remote = FlakyRemote::new(ChaosConfig::calm());
        for _ in 0..100 {
            remote.save(&key(), RecordFields::new()).await.unwrap();
        }
        assert_eq!(remote.stats().failures, 0);
        assert_eq!(remote.inner().calls().save, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_seed_same_faults() {
        let a = FlakyRemote::new(ChaosConfig::poor().with_seed(9));
        let b = FlakyRemote::new(ChaosConfig::poor().with_seed(9));

        for _ in 0..50 {
            let ra = a.account_status().await.is_ok();
            let rb = b.account_status().await.is_ok();
            assert_eq!(ra, rb);
        }
        assert_eq!(a.stats(), b.stats());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_does_not_write() {
        let remote = FlakyRemote::new(ChaosConfig {
            failure_rate: 1.0,
            ..ChaosConfig::calm()
        });

        let result = remote.save(&key(), RecordFields::new()).await;
        assert!(matches!(result, Err(SyncError::Network(_))));
        assert!(remote.inner().is_empty());
    }
}
