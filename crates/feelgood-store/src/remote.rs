//! Remote record store contract

use std::fmt;

use async_trait::async_trait;
use feelgood_core::{RecordFields, SyncResult};

/// Address of a remote record: its type plus a fixed record name.
/// Exactly one record per device account is expected to exist.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub record_type: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(record_type: impl Into<String>, name: impl Into<String>) -> Self {
        RecordKey {
            record_type: record_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.record_type, self.name)
    }
}

/// Remote identity status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountStatus {
    Available,
    NoAccount,
    Restricted,
    CouldNotDetermine,
}

impl AccountStatus {
    pub fn is_available(self) -> bool {
        self == AccountStatus::Available
    }
}

/// Asynchronous remote record store.
///
/// Implementations report a missing record from `fetch_by_key` as
/// `SyncError::RecordNotFound`; other failures map onto the remaining
/// `SyncError` variants.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn account_status(&self) -> SyncResult<AccountStatus>;

    async fn fetch_by_key(&self, key: &RecordKey) -> SyncResult<RecordFields>;

    /// First record of `record_type`, if any
    async fn query_first(&self, record_type: &str) -> SyncResult<Option<RecordFields>>;

    /// Create or overwrite the record at `key`
    async fn save(&self, key: &RecordKey, fields: RecordFields) -> SyncResult<()>;
}
