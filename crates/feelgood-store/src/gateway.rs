//! Remote record gateway
//!
//! Wraps a `RemoteStore` with the access policy every caller needs:
//! 1. Check the account before touching records
//! 2. Fetch by key, falling back to a type query when the key is unknown
//! 3. Decode leniently and sanitize the interval
//! 4. Bound every round trip by a deadline

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use feelgood_core::{
    decode_fields, encode_fields, Clock, ProgressRecord, SyncError, SyncResult, SystemClock,
};

use crate::{AccountStatus, RecordKey, RemoteStore};

/// Remote sync configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SyncConfig {
    /// Record type used by the query fallback
    pub record_type: String,
    /// Fixed record name fetched by key
    pub record_name: String,
    /// Deadline for account check plus fetch (plus fallback query)
    pub fetch_timeout: Duration,
    /// Deadline for account check plus save
    pub save_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            record_type: "GameState".to_string(),
            record_name: "FeelGoodGameState".to_string(),
            fetch_timeout: Duration::from_secs(10),
            save_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Short deadlines for flaky connections: fail fast, stay playable
    pub fn offline_friendly() -> Self {
        SyncConfig {
            fetch_timeout: Duration::from_secs(3),
            save_timeout: Duration::from_secs(3),
            ..Self::default()
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.record_type, &self.record_name)
    }
}

/// Access-policy wrapper over a remote store
pub struct RecordGateway<R: RemoteStore> {
    store: Arc<R>,
    key: RecordKey,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
}

impl<R: RemoteStore> RecordGateway<R> {
    pub fn new(store: Arc<R>, config: SyncConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<R>, config: SyncConfig, clock: Arc<dyn Clock>) -> Self {
        RecordGateway {
            key: config.key(),
            store,
            config,
            clock,
        }
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<R> {
        &self.store
    }

    /// Fetch the progress record. `Ok(None)` means no record exists yet.
    pub async fn fetch(&self) -> SyncResult<Option<ProgressRecord>> {
        with_deadline(self.config.fetch_timeout, async {
            self.require_account().await?;

            let fields = match self.store.fetch_by_key(&self.key).await {
                Ok(fields) => Some(fields),
                Err(SyncError::RecordNotFound) => {
                    tracing::debug!(key = %self.key, "record not found by key, querying by type");
                    match self.store.query_first(&self.key.record_type).await {
                        Ok(found) => found,
                        Err(SyncError::RecordNotFound) => None,
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };

            Ok(fields.map(|f| decode_fields(&f, self.clock.now())))
        })
        .await
    }

    /// Overwrite the remote record with `record`
    pub async fn save(&self, record: &ProgressRecord) -> SyncResult<()> {
        let fields = encode_fields(record);
        with_deadline(self.config.save_timeout, async {
            self.require_account().await?;
            self.store.save(&self.key, fields).await
        })
        .await
    }

    async fn require_account(&self) -> SyncResult<()> {
        match self.store.account_status().await? {
            AccountStatus::Available => Ok(()),
            status => {
                tracing::debug!(?status, "remote account unavailable");
                Err(SyncError::AccountUnavailable)
            }
        }
    }
}

async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = SyncResult<T>>,
) -> SyncResult<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(deadline)),
    }
}
