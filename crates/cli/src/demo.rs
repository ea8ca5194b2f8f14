use crate::error::CliError;
use async_trait::async_trait;
use chrono::Utc;
use feed_core::{
    metrics::FeedMetrics,
    retry::RetryPolicy,
    state::{CheckpointStore, memory::MemoryCheckpointStore, sled_store::SledCheckpointStore},
    store::{DocumentStore, memory::MemoryStore},
};
use feed_runtime::{
    cursor::ChangeFeedCursor,
    reader::FeedReader,
    sink::RecordSink,
};
use model::feed::{
    options::FeedConfig,
    record::{ChangeRecord, PartitionId, RecordId},
};
use serde_json::json;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Prints each record as it comes off the feed.
struct PrintSink;

#[async_trait]
impl RecordSink for PrintSink {
    async fn deliver(
        &mut self,
        partition: &PartitionId,
        record: &ChangeRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            partition = %partition,
            id = %record.id,
            modified = %record.modified,
            "Read document from the change feed"
        );
        Ok(())
    }
}

/// Replays the change-feed sample narrative: two documents land before
/// the cutoff, five more after it, and the first document is rewritten
/// so it moves behind the second in its partition's change order. The
/// final read pass shows per-partition chronological delivery stopping
/// at the cutoff.
pub async fn run(
    partitions: usize,
    durable: Option<PathBuf>,
    pause_ms: u64,
) -> Result<(), CliError> {
    let pause = Duration::from_millis(pause_ms);
    let store = Arc::new(MemoryStore::new(partitions));

    let feed_started = Utc::now();
    info!(feed_started = %feed_started, "Feed start time captured");
    sleep(pause).await;

    let id1 = RecordId::new(format!("Id1-{}", Uuid::new_v4()));
    let id2 = RecordId::new(format!("Id2-{}", Uuid::new_v4()));

    info!(id = %id1, "Inserting first document");
    store
        .insert_document(id1.clone(), json!({ "ordinal": 1 }))
        .await?;
    sleep(pause).await;

    info!(id = %id2, "Inserting second document");
    store
        .insert_document(id2.clone(), json!({ "ordinal": 2 }))
        .await?;

    // Everything written from here on is past the cutoff and must not
    // appear in the read pass.
    let cutoff = Utc::now();
    info!(cutoff = %cutoff, "Read cutoff time captured");
    sleep(pause).await;

    info!("Inserting documents that arrive after the cutoff");
    for i in 3..8 {
        let id = RecordId::new(format!("Id{i}-{}", Uuid::new_v4()));
        info!(id = %id, "Inserting");
        store
            .insert_document(id, json!({ "ordinal": i }))
            .await?;
    }

    info!(id = %id1, "Rewriting the first document, moving it behind the second in change order");
    store
        .replace_document(&id1, json!({ "ordinal": 1, "rewritten": true }))
        .await?;

    let checkpoints: Arc<dyn CheckpointStore> = match durable {
        Some(path) => {
            info!(path = %path.display(), "Using durable sled checkpoints");
            Arc::new(SledCheckpointStore::open(path)?)
        }
        None => Arc::new(MemoryCheckpointStore::new()),
    };

    let metrics = FeedMetrics::new();
    let cursor = ChangeFeedCursor::new(
        store,
        FeedConfig::new(feed_started),
        RetryPolicy::for_feed_reads(),
        metrics.clone(),
    );
    let reader = FeedReader::new(
        cursor,
        checkpoints,
        metrics.clone(),
        CancellationToken::new(),
    );

    let mut sink = PrintSink;
    let summaries = reader.run(cutoff, &mut sink).await?;

    for summary in &summaries {
        info!(
            partition = %summary.partition,
            emitted = summary.emitted,
            outcome = ?summary.outcome,
            "Partition summary"
        );
    }

    let snapshot = metrics.snapshot();
    info!(
        records = snapshot.records_emitted,
        pages = snapshot.pages_fetched,
        retries = snapshot.retry_count,
        "End of demo"
    );

    Ok(())
}
