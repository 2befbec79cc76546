use thiserror::Error;

use crate::{domain::FlagName, path::StorePath};

/// Failures reported by a remote state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("subscription stream disconnected")]
    Disconnected,
    #[error("invalid store path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("unexpected store response: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("no data at '{path}'")]
    NotFound { path: StorePath },
    #[error("could not decode '{path}': {reason}")]
    Decode { path: StorePath, reason: String },
    #[error("write of {flag} failed: {cause}")]
    WriteFailed { flag: FlagName, cause: StoreError },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn decode(path: &StorePath, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn not_found(path: &StorePath) -> Self {
        Self::NotFound { path: path.clone() }
    }

    /// Decode and missing-data failures are shown as "absent" rather than raised.
    pub fn is_absent(&self) -> bool {
        matches!(self, SyncError::NotFound { .. } | SyncError::Decode { .. })
    }
}
