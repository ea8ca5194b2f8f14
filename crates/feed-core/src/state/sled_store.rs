use crate::{
    error::StateError,
    state::{Checkpoint, CheckpointStore},
};
use async_trait::async_trait;
use model::feed::record::PartitionId;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

/// Durable checkpoint store backed by sled. Checkpoints survive a
/// process crash; resuming picks up at the last committed page.
pub struct SledCheckpointStore {
    db: sled::Db,
}

impl SledCheckpointStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn key(partition: &PartitionId) -> String {
        format!("chk:{partition}")
    }
}

#[async_trait]
impl CheckpointStore for SledCheckpointStore {
    async fn save(&self, cp: &Checkpoint) -> Result<(), StateError> {
        let key = Self::key(&cp.partition);
        let bytes = bincode::serialize(cp)?;

        // Atomic check-then-set so concurrent writers can never move a
        // checkpoint backwards.
        let result = self.db.transaction(|tx| {
            if let Some(existing_bytes) = tx.get(&key)? {
                let existing: Checkpoint = bincode::deserialize(&existing_bytes)
                    .map_err(|e| ConflictableTransactionError::Abort(StateError::Codec(e)))?;

                if existing.records_done > cp.records_done {
                    // Stale write, intentionally skipped.
                    return Ok(());
                }
            }

            tx.insert(&*key, bytes.as_slice())?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    async fn load(&self, partition: &PartitionId) -> Result<Option<Checkpoint>, StateError> {
        match self.db.get(Self::key(partition))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self, partition: &PartitionId) -> Result<(), StateError> {
        self.db.remove(Self::key(partition))?;
        Ok(())
    }
}
