use crate::error::StateError;
use async_trait::async_trait;
use model::feed::record::PartitionId;

pub mod memory;
mod models;
pub mod sled_store;

pub use models::Checkpoint;

/// Checkpoint persistence boundary.
///
/// Recovery semantics depend on the backend: the in-memory store
/// ([`memory::MemoryCheckpointStore`]) lives and dies with the process,
/// so a crash re-reads the whole feed from the configured origin; the
/// sled-backed store ([`sled_store::SledCheckpointStore`]) survives a
/// restart and resumes from the last committed page.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persists `cp`, ignoring writes that would move a partition's
    /// checkpoint backwards.
    async fn save(&self, cp: &Checkpoint) -> Result<(), StateError>;

    async fn load(&self, partition: &PartitionId) -> Result<Option<Checkpoint>, StateError>;

    /// Drops a partition's checkpoint, e.g. after the partition itself
    /// is gone and the token can never be redeemed.
    async fn clear(&self, partition: &PartitionId) -> Result<(), StateError>;
}
