use crate::retry::RetryDisposition;
use model::feed::record::{PartitionId, RecordId};
use thiserror::Error;

/// Errors surfaced by the external change-feed store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Network or service hiccup. Safe to retry with the same
    /// continuation token.
    #[error("Transient store failure: {0}")]
    Transient(String),

    /// The partition no longer exists (split, merged, or dropped).
    /// Never retried; the caller must re-enumerate partitions and
    /// discard the stale checkpoint.
    #[error("Partition '{0}' is gone")]
    PartitionGone(PartitionId),

    /// The requested document does not exist.
    #[error("Document '{0}' not found")]
    DocumentNotFound(RecordId),

    /// An insert collided with an existing document id.
    #[error("Document '{0}' already exists")]
    DocumentExists(RecordId),

    /// The continuation token was not minted by this store or has been
    /// corrupted in transit.
    #[error("Malformed continuation token: {0}")]
    BadContinuation(String),
}

/// Maps a store error to its retry disposition: only transient read
/// failures are retried, always with the checkpoint unchanged.
pub fn classify_store_error(err: &StoreError) -> RetryDisposition {
    match err {
        StoreError::Transient(_) => RetryDisposition::Retry,
        StoreError::PartitionGone(_) => RetryDisposition::Stop,
        StoreError::DocumentNotFound(_) => RetryDisposition::Stop,
        StoreError::DocumentExists(_) => RetryDisposition::Stop,
        StoreError::BadContinuation(_) => RetryDisposition::Stop,
    }
}

/// Errors from checkpoint persistence backends.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Checkpoint store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Checkpoint encode/decode failed: {0}")]
    Codec(#[from] bincode::Error),
}
