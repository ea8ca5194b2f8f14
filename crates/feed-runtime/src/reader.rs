use crate::{
    cursor::{ChangeFeedCursor, DrainOutcome, FeedIterator},
    error::FeedError,
    sink::RecordSink,
};
use chrono::{DateTime, Utc};
use feed_core::{metrics::FeedMetrics, state::CheckpointStore};
use model::feed::record::PartitionId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of draining one partition to the cutoff.
#[derive(Debug, Clone)]
pub struct DrainSummary {
    pub partition: PartitionId,
    pub emitted: u64,
    pub outcome: DrainOutcome,
}

/// Drains every partition of the feed, sequentially, up to a shared
/// cutoff.
///
/// Each partition is resumed from its persisted checkpoint; the
/// checkpoint is re-persisted whenever a page has been fully delivered
/// to the sink. Partitions are independent: no ordering holds across
/// them, only within each one.
pub struct FeedReader {
    cursor: ChangeFeedCursor,
    checkpoints: Arc<dyn CheckpointStore>,
    metrics: FeedMetrics,
    cancel: CancellationToken,
}

impl FeedReader {
    pub fn new(
        cursor: ChangeFeedCursor,
        checkpoints: Arc<dyn CheckpointStore>,
        metrics: FeedMetrics,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cursor,
            checkpoints,
            metrics,
            cancel,
        }
    }

    /// Runs one cutoff-bounded pass over all partitions.
    pub async fn run(
        &self,
        cutoff: DateTime<Utc>,
        sink: &mut dyn RecordSink,
    ) -> Result<Vec<DrainSummary>, FeedError> {
        let partitions = self.list_all_partitions().await?;
        info!(partitions = partitions.len(), cutoff = %cutoff, "Starting feed pass");

        let mut summaries = Vec::with_capacity(partitions.len());
        for partition in partitions {
            if self.cancel.is_cancelled() {
                summaries.push(DrainSummary {
                    partition,
                    emitted: 0,
                    outcome: DrainOutcome::Cancelled,
                });
                continue;
            }

            summaries.push(self.drain_partition(partition, cutoff, sink).await?);
        }

        Ok(summaries)
    }

    async fn list_all_partitions(&self) -> Result<Vec<PartitionId>, FeedError> {
        let store = self.cursor.store();
        let mut partitions = Vec::new();
        let mut token = None;
        loop {
            let page = store.list_partitions(token).await?;
            partitions.extend(page.partitions);
            match page.continuation {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(partitions)
    }

    async fn drain_partition(
        &self,
        partition: PartitionId,
        cutoff: DateTime<Utc>,
        sink: &mut dyn RecordSink,
    ) -> Result<DrainSummary, FeedError> {
        let checkpoint = self.checkpoints.load(&partition).await?;
        let mut iter = match self.cursor.open(partition.clone(), checkpoint).await {
            Ok(iter) => iter,
            Err(err) => return Err(self.handle_gone(&partition, err).await?),
        };

        let mut emitted = 0u64;
        let mut persisted_through = iter.records_done();

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break DrainOutcome::Cancelled;
            }

            match self.cursor.next_record(&mut iter, cutoff).await {
                Ok(Some(record)) => {
                    sink.deliver(&partition, &record)
                        .await
                        .map_err(|source| FeedError::Sink {
                            record: record.id.clone(),
                            source,
                        })?;
                    emitted += 1;
                    self.metrics.increment_records(1);

                    self.persist_if_advanced(&iter, &mut persisted_through)
                        .await?;
                }
                Ok(None) => break iter.outcome().unwrap_or(DrainOutcome::Exhausted),
                Err(err) => return Err(self.handle_gone(&partition, err).await?),
            }
        };

        self.metrics.increment_partitions(1);
        info!(partition = %partition, emitted, ?outcome, "Partition drained");

        Ok(DrainSummary {
            partition,
            emitted,
            outcome,
        })
    }

    async fn persist_if_advanced(
        &self,
        iter: &FeedIterator,
        persisted_through: &mut u64,
    ) -> Result<(), FeedError> {
        if iter.records_done() > *persisted_through {
            self.checkpoints.save(&iter.checkpoint()).await?;
            *persisted_through = iter.records_done();
        }
        Ok(())
    }

    /// A gone partition invalidates its checkpoint: drop it before
    /// surfacing the error so the next pass starts clean.
    async fn handle_gone(
        &self,
        partition: &PartitionId,
        err: FeedError,
    ) -> Result<FeedError, FeedError> {
        if err.is_partition_gone() {
            warn!(partition = %partition, "Partition is gone, dropping its checkpoint");
            self.checkpoints.clear(partition).await?;
        }
        Ok(err)
    }
}
