use crate::cursor::ChangeFeedCursor;
use chrono::{DateTime, Utc};
use feed_core::{
    metrics::FeedMetrics,
    retry::RetryPolicy,
    store::{ChangeFeedStore, DocumentStore, memory::MemoryStore},
};
use model::feed::{
    options::FeedConfig,
    record::{ChangeRecord, RecordId},
};
use serde_json::json;
use std::sync::Arc;

mod reader;

fn origin() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

fn far_future() -> DateTime<Utc> {
    DateTime::<Utc>::MAX_UTC
}

fn cursor_over(
    store: Arc<dyn ChangeFeedStore>,
    start_time: DateTime<Utc>,
    page_size: usize,
) -> ChangeFeedCursor {
    ChangeFeedCursor::new(
        store,
        FeedConfig::new(start_time).with_max_item_count(page_size),
        RetryPolicy::none(),
        FeedMetrics::new(),
    )
}

async fn insert(store: &MemoryStore, id: &str) -> ChangeRecord {
    store
        .insert_document(RecordId::new(id), json!({ "name": id }))
        .await
        .unwrap()
}
