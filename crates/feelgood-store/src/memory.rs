//! In-process remote record store

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use feelgood_core::{RecordFields, SyncError, SyncResult};
use parking_lot::Mutex;

use crate::{AccountStatus, RecordKey, RemoteStore};

/// Remote operation, for failure injection and call accounting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    AccountStatus,
    Fetch,
    Query,
    Save,
}

/// Per-operation call counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteCalls {
    pub account_status: u64,
    pub fetch: u64,
    pub query: u64,
    pub save: u64,
}

/// Remote store living in memory.
///
/// Records are kept in insertion order so `query_first` is deterministic.
/// Failures queued with `fail_next` are consumed by the next matching call.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    records: Mutex<Vec<(RecordKey, RecordFields)>>,
    account: Mutex<AccountStatus>,
    failures: Mutex<VecDeque<(RemoteOp, SyncError)>>,
    latency: Mutex<Duration>,
    calls: Mutex<RemoteCalls>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        MemoryRemoteStore {
            records: Mutex::new(Vec::new()),
            account: Mutex::new(AccountStatus::Available),
            failures: Mutex::new(VecDeque::new()),
            latency: Mutex::new(Duration::ZERO),
            calls: Mutex::new(RemoteCalls::default()),
        }
    }

    pub fn set_account_status(&self, status: AccountStatus) {
        *self.account.lock() = status;
    }

    /// Delay applied to every operation
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn fail_next(&self, op: RemoteOp, error: SyncError) {
        self.failures.lock().push_back((op, error));
    }

    /// Store fields directly, bypassing account checks and failures
    pub fn insert(&self, key: RecordKey, fields: RecordFields) {
        let mut records = self.records.lock();
        match records.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = fields,
            None => records.push((key, fields)),
        }
    }

    pub fn get(&self, key: &RecordKey) -> Option<RecordFields> {
        self.records
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, f)| f.clone())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn calls(&self) -> RemoteCalls {
        self.calls.lock().clone()
    }

    async fn enter(&self, op: RemoteOp) -> SyncResult<()> {
        {
            let mut calls = self.calls.lock();
            match op {
                RemoteOp::AccountStatus => calls.account_status += 1,
                RemoteOp::Fetch => calls.fetch += 1,
                RemoteOp::Query => calls.query += 1,
                RemoteOp::Save => calls.save += 1,
            }
        }

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.lock();
        if let Some(pos) = failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, error)) = failures.remove(pos) {
                return Err(error);
            }
        }
        Ok(())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn account_status(&self) -> SyncResult<AccountStatus> {
        self.enter(RemoteOp::AccountStatus).await?;
        Ok(*self.account.lock())
    }

    async fn fetch_by_key(&self, key: &RecordKey) -> SyncResult<RecordFields> {
        self.enter(RemoteOp::Fetch).await?;
        self.get(key).ok_or(SyncError::RecordNotFound)
    }

    async fn query_first(&self, record_type: &str) -> SyncResult<Option<RecordFields>> {
        self.enter(RemoteOp::Query).await?;
        Ok(self
            .records
            .lock()
            .iter()
            .find(|(k, _)| k.record_type == record_type)
            .map(|(_, f)| f.clone()))
    }

    async fn save(&self, key: &RecordKey, fields: RecordFields) -> SyncResult<()> {
        self.enter(RemoteOp::Save).await?;
        self.insert(key.clone(), fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feelgood_core::{encode_fields, ProgressRecord, RecordTime};

    fn key() -> RecordKey {
        RecordKey::new("GameState", "FeelGoodGameState")
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let store = MemoryRemoteStore::new();
        assert_eq!(store.fetch_by_key(&key()).await, Err(SyncError::RecordNotFound));
    }

    #[tokio::test]
    async fn test_save_then_fetch() {
        let store = MemoryRemoteStore::new();
        let fields = encode_fields(&ProgressRecord::new(RecordTime::from_secs(1)));

        store.save(&key(), fields.clone()).await.unwrap();
        assert_eq!(store.fetch_by_key(&key()).await.unwrap(), fields);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let store = MemoryRemoteStore::new();
        store.fail_next(RemoteOp::Save, SyncError::Network("offline".into()));

        let fields = RecordFields::new();
        assert!(store.save(&key(), fields.clone()).await.is_err());
        assert!(store.save(&key(), fields).await.is_ok());
        assert_eq!(store.calls().save, 2);
    }

    #[tokio::test]
    async fn test_query_first_matches_type() {
        let store = MemoryRemoteStore::new();
        store.insert(RecordKey::new("Other", "x"), RecordFields::new());
        let mut fields = RecordFields::new();
        fields.insert("score".into(), 3.into());
        store.insert(RecordKey::new("GameState", "legacy"), fields.clone());

        assert_eq!(store.query_first("GameState").await.unwrap(), Some(fields));
        assert_eq!(store.query_first("Missing").await.unwrap(), None);
    }
}
