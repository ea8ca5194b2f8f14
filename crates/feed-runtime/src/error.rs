use feed_core::error::{StateError, StoreError};
use model::feed::record::{PartitionId, RecordId};
use thiserror::Error;

/// Errors surfaced by the cursor and the multi-partition reader.
#[derive(Error, Debug)]
pub enum FeedError {
    /// A non-retryable store error, surfaced as-is. Includes partition
    /// disappearance, which the caller handles by re-enumerating
    /// partitions and dropping the stale checkpoint.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A transient store error that outlived the retry budget.
    #[error("Retry attempts exhausted reading partition '{partition}': {source}")]
    RetriesExhausted {
        partition: PartitionId,
        #[source]
        source: StoreError,
    },

    #[error("Checkpoint store operation failed: {0}")]
    Checkpoint(#[from] StateError),

    #[error("Sink rejected record '{record}': {source}")]
    Sink {
        record: RecordId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FeedError {
    /// True when the underlying partition no longer exists.
    pub fn is_partition_gone(&self) -> bool {
        matches!(self, FeedError::Store(StoreError::PartitionGone(_)))
    }
}
