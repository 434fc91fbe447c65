//! Error types for the sync engine

use faunasync_client::{GroupId, TransferError};
use faunasync_store::StoreError;
use thiserror::Error;

/// Sync error type
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The remote answered with something the protocol does not allow.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// No baseline to diff against; the group is skipped, not aborted.
    #[error("No checkpoint for group {0} and no explicit since date")]
    MissingCheckpoint(GroupId),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
