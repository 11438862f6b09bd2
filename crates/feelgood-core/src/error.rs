//! Error types for progress persistence

use std::time::Duration;

use thiserror::Error;

/// Remote record store errors
///
/// None of these is fatal: the in-memory record stays usable offline and
/// the caller decides how to surface the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Remote identity is not signed in
    #[error("Cloud account is not available")]
    AccountUnavailable,

    #[error("Network error: {0}")]
    Network(String),

    /// Expected on first run; callers treat it as "no record yet"
    #[error("Progress record not found")]
    RecordNotFound,

    #[error("Remote operation timed out after {0:?}")]
    Timeout(Duration),

    /// Another reconciliation for the same record is still in flight
    #[error("Reconciliation already in flight")]
    Busy,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Transient failures that may succeed if tried again later.
    /// Nothing in this workspace retries automatically.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::Timeout(_) | SyncError::Busy
        )
    }

    /// Only resolved by the user signing in
    pub fn needs_user_action(&self) -> bool {
        matches!(self, SyncError::AccountUnavailable)
    }

    pub fn kind(&self) -> SyncErrorKind {
        match self {
            SyncError::AccountUnavailable => SyncErrorKind::AccountUnavailable,
            SyncError::Network(_) => SyncErrorKind::Network,
            SyncError::RecordNotFound => SyncErrorKind::RecordNotFound,
            SyncError::Timeout(_) => SyncErrorKind::Timeout,
            SyncError::Busy => SyncErrorKind::Busy,
            SyncError::Unknown(_) => SyncErrorKind::Unknown,
        }
    }
}

/// Payload-free discriminant of `SyncError`, for status indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncErrorKind {
    AccountUnavailable,
    Network,
    RecordNotFound,
    Timeout,
    Busy,
    Unknown,
}

/// Result type for remote operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Local persistence errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed storage file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for local persistence
pub type StoreResult<T> = Result<T, StoreError>;
