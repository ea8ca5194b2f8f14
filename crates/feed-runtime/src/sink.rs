use async_trait::async_trait;
use model::feed::record::{ChangeRecord, PartitionId};

/// Destination for records emitted by a feed drain.
#[async_trait]
pub trait RecordSink: Send {
    async fn deliver(
        &mut self,
        partition: &PartitionId,
        record: &ChangeRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Collects everything delivered, in delivery order.
#[derive(Default)]
pub struct VecSink {
    pub received: Vec<(PartitionId, ChangeRecord)>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ids(&self) -> Vec<&str> {
        self.received.iter().map(|(_, r)| r.id.as_str()).collect()
    }
}

#[async_trait]
impl RecordSink for VecSink {
    async fn deliver(
        &mut self,
        partition: &PartitionId,
        record: &ChangeRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.received.push((partition.clone(), record.clone()));
        Ok(())
    }
}
