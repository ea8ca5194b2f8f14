use crate::{
    error::StateError,
    state::{Checkpoint, CheckpointStore},
};
use async_trait::async_trait;
use model::feed::record::PartitionId;
use std::{collections::HashMap, sync::RwLock};

/// Process-local checkpoint store. Nothing survives a restart; a new
/// process re-reads the feed from the configured origin.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<PartitionId, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, cp: &Checkpoint) -> Result<(), StateError> {
        let mut map = self.checkpoints.write().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = map.get(&cp.partition)
            && existing.records_done > cp.records_done
        {
            // Stale write, keep the newer checkpoint.
            return Ok(());
        }

        map.insert(cp.partition.clone(), cp.clone());
        Ok(())
    }

    async fn load(&self, partition: &PartitionId) -> Result<Option<Checkpoint>, StateError> {
        let map = self.checkpoints.read().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(partition).cloned())
    }

    async fn clear(&self, partition: &PartitionId) -> Result<(), StateError> {
        let mut map = self.checkpoints.write().unwrap_or_else(|e| e.into_inner());
        map.remove(partition);
        Ok(())
    }
}
