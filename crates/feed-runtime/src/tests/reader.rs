use crate::{
    cursor::{ChangeFeedCursor, DrainOutcome},
    reader::FeedReader,
    sink::VecSink,
    tests::{far_future, insert, origin},
};
use chrono::{DateTime, Utc};
use feed_core::{
    metrics::FeedMetrics,
    retry::RetryPolicy,
    state::{CheckpointStore, memory::MemoryCheckpointStore, sled_store::SledCheckpointStore},
    store::{ChangeFeedStore, DocumentStore, memory::MemoryStore},
};
use model::feed::{
    options::{FeedConfig, ReadOptions},
    record::{PartitionId, RecordId},
};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn reader_over(
    store: Arc<dyn ChangeFeedStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    start_time: DateTime<Utc>,
) -> (FeedReader, FeedMetrics) {
    let metrics = FeedMetrics::new();
    let cursor = ChangeFeedCursor::new(
        store,
        FeedConfig::new(start_time).with_max_item_count(4),
        RetryPolicy::none(),
        metrics.clone(),
    );
    let reader = FeedReader::new(
        cursor,
        checkpoints,
        metrics.clone(),
        CancellationToken::new(),
    );
    (reader, metrics)
}

/// First record currently in `partition`, straight from the store.
async fn first_record_in(store: &MemoryStore, partition: &PartitionId) -> RecordId {
    let page = store
        .read_change_page(
            partition,
            &ReadOptions {
                start_time: origin(),
                continuation: None,
                max_item_count: None,
            },
        )
        .await
        .unwrap();
    page.records
        .first()
        .unwrap_or_else(|| panic!("partition {partition} is empty"))
        .id
        .clone()
}

#[tokio::test]
async fn drains_every_partition_and_persists_checkpoints() {
    let store = Arc::new(MemoryStore::new(2));
    for i in 0..16 {
        insert(&store, &format!("doc-{i}")).await;
    }

    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let (reader, metrics) = reader_over(store, checkpoints.clone(), origin());

    let mut sink = VecSink::new();
    let summaries = reader.run(far_future(), &mut sink).await.unwrap();

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.outcome == DrainOutcome::Exhausted));
    assert_eq!(sink.received.len(), 16);

    for summary in &summaries {
        let checkpoint = checkpoints.load(&summary.partition).await.unwrap();
        let delivered = sink
            .received
            .iter()
            .filter(|(p, _)| *p == summary.partition)
            .count() as u64;
        assert_eq!(summary.emitted, delivered);
        match checkpoint {
            Some(cp) => assert_eq!(cp.records_done, delivered),
            None => assert_eq!(delivered, 0),
        }
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.records_emitted, 16);
    assert_eq!(snapshot.partitions_drained, 2);
    assert_eq!(snapshot.failure_count, 0);
}

#[tokio::test]
async fn partition_order_holds_but_cross_partition_order_does_not() {
    let store = Arc::new(MemoryStore::new(2));
    for i in 0..16 {
        insert(&store, &format!("doc-{i}")).await;
    }

    // Rewrite one early document from the first-drained partition: its
    // modification time becomes the global maximum while it stays in
    // partition range-0, which is drained before range-1.
    let rewritten = first_record_in(&store, &PartitionId::new("range-0")).await;
    store
        .replace_document(&rewritten, json!({ "rewritten": true }))
        .await
        .unwrap();

    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let (reader, _) = reader_over(store, checkpoints, origin());

    let mut sink = VecSink::new();
    reader.run(far_future(), &mut sink).await.unwrap();
    assert_eq!(sink.received.len(), 16);

    // Within each partition, delivery is non-decreasing in modified
    // time.
    for partition in ["range-0", "range-1"] {
        let partition = PartitionId::new(partition);
        let times: Vec<_> = sink
            .received
            .iter()
            .filter(|(p, _)| *p == partition)
            .map(|(_, r)| r.modified)
            .collect();
        assert!(!times.is_empty(), "partition {partition} received nothing");
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    // Across partitions, the concatenated delivery order is not
    // globally chronological: range-0 now ends with the rewrite, which
    // postdates everything range-1 delivers after it.
    let all_times: Vec<_> = sink.received.iter().map(|(_, r)| r.modified).collect();
    assert!(
        all_times.windows(2).any(|w| w[0] > w[1]),
        "cross-partition delivery happened to be globally sorted"
    );
}

#[tokio::test]
async fn second_pass_emits_only_new_changes() {
    let store = Arc::new(MemoryStore::new(1));
    insert(&store, "first").await;
    insert(&store, "second").await;

    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let (reader, _) = reader_over(store.clone(), checkpoints.clone(), origin());

    let mut pass_one = VecSink::new();
    reader.run(far_future(), &mut pass_one).await.unwrap();
    assert_eq!(pass_one.record_ids(), vec!["first", "second"]);

    // New changes appear after the feed reported has_more == false;
    // re-polling from the committed checkpoint picks up exactly those.
    insert(&store, "third").await;
    insert(&store, "fourth").await;

    let mut pass_two = VecSink::new();
    reader.run(far_future(), &mut pass_two).await.unwrap();
    assert_eq!(pass_two.record_ids(), vec!["third", "fourth"]);
}

#[tokio::test]
async fn cancelled_run_emits_nothing_and_commits_nothing() {
    let store = Arc::new(MemoryStore::new(2));
    insert(&store, "pending").await;

    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let metrics = FeedMetrics::new();
    let cursor = ChangeFeedCursor::new(
        store,
        FeedConfig::new(origin()),
        RetryPolicy::none(),
        metrics.clone(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let reader = FeedReader::new(cursor, checkpoints.clone(), metrics, cancel);

    let mut sink = VecSink::new();
    let summaries = reader.run(far_future(), &mut sink).await.unwrap();

    assert!(sink.received.is_empty());
    assert!(summaries.iter().all(|s| s.outcome == DrainOutcome::Cancelled));
    for summary in &summaries {
        assert!(checkpoints.load(&summary.partition).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn durable_checkpoints_survive_a_restart() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new(1));
    insert(&store, "before-crash").await;

    {
        let checkpoints = Arc::new(SledCheckpointStore::open(dir.path()).unwrap());
        let (reader, _) = reader_over(store.clone(), checkpoints, origin());
        let mut sink = VecSink::new();
        reader.run(far_future(), &mut sink).await.unwrap();
        assert_eq!(sink.record_ids(), vec!["before-crash"]);
    }

    // "Restart": a fresh reader over the same sled path resumes where
    // the previous process left off.
    insert(&store, "after-restart").await;
    let checkpoints = Arc::new(SledCheckpointStore::open(dir.path()).unwrap());
    let (reader, _) = reader_over(store, checkpoints, origin());

    let mut sink = VecSink::new();
    reader.run(far_future(), &mut sink).await.unwrap();
    assert_eq!(sink.record_ids(), vec!["after-restart"]);
}
