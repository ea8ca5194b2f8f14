use crate::error::StoreError;
use async_trait::async_trait;
use model::feed::{
    continuation::Continuation,
    options::ReadOptions,
    page::{ChangePage, PartitionPage},
    record::{ChangeRecord, PartitionId, RecordId},
};

pub mod flaky;
pub mod memory;

/// Read boundary onto the external store's change feed.
///
/// Both operations are network calls in a real backend. Ordering
/// contract: within one partition, `read_change_page` delivers records
/// in the order the store committed them; nothing is guaranteed across
/// partitions.
#[async_trait]
pub trait ChangeFeedStore: Send + Sync {
    /// Enumerates partitions, one page at a time. Callers loop until
    /// the returned continuation is `None`.
    async fn list_partitions(
        &self,
        continuation: Option<Continuation>,
    ) -> Result<PartitionPage, StoreError>;

    /// Fetches the next batch of changes for `partition`. The
    /// continuation in `options` takes precedence over the start time;
    /// an empty page echoes the request's continuation back unchanged.
    async fn read_change_page(
        &self,
        partition: &PartitionId,
        options: &ReadOptions,
    ) -> Result<ChangePage, StoreError>;
}

/// Outcome of a delete, distinguishing "already absent" from an actual
/// removal so callers never have to swallow not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Document write surface of the store. The store assigns the modified
/// timestamp on every successful write; this crate never generates it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(
        &self,
        id: RecordId,
        body: serde_json::Value,
    ) -> Result<ChangeRecord, StoreError>;

    /// Replaces an existing document, moving it to the tail of its
    /// partition's change log.
    async fn replace_document(
        &self,
        id: &RecordId,
        body: serde_json::Value,
    ) -> Result<ChangeRecord, StoreError>;

    async fn read_document(&self, id: &RecordId) -> Result<ChangeRecord, StoreError>;

    async fn delete_document(&self, id: &RecordId) -> Result<DeleteOutcome, StoreError>;
}
