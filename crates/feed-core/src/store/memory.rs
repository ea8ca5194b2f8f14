use crate::{
    error::StoreError,
    store::{ChangeFeedStore, DeleteOutcome, DocumentStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use model::feed::{
    continuation::Continuation,
    options::ReadOptions,
    page::{ChangePage, PartitionPage},
    record::{ChangeRecord, PartitionId, RecordId},
};
use std::{collections::HashMap, sync::RwLock};
use xxhash_rust::xxh3::xxh3_64;

const DEFAULT_PAGE_SIZE: usize = 100;

/// In-memory change-feed store.
///
/// Documents are routed to a fixed set of partitions by hashing their
/// id. Each partition keeps an append-only change log holding the
/// latest version of every document, ordered by last write: rewriting a
/// document removes its earlier log entry and appends the new version
/// at the tail. Modification timestamps are assigned here and are
/// strictly increasing across the whole store.
///
/// Continuation tokens encode the log sequence number of the last
/// delivered entry; they stay valid across document rewrites because
/// sequence numbers are never reused.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

struct Inner {
    partitions: Vec<PartitionLog>,
    /// Document id -> owning partition index.
    index: HashMap<RecordId, usize>,
    last_modified: DateTime<Utc>,
}

struct PartitionLog {
    id: PartitionId,
    entries: Vec<LogEntry>,
    next_lsn: u64,
}

struct LogEntry {
    lsn: u64,
    record: ChangeRecord,
}

impl MemoryStore {
    pub fn new(partition_count: usize) -> Self {
        let count = partition_count.max(1);
        let partitions = (0..count)
            .map(|i| PartitionLog {
                id: PartitionId::new(format!("range-{i}")),
                entries: Vec::new(),
                next_lsn: 0,
            })
            .collect();

        Self {
            inner: RwLock::new(Inner {
                partitions,
                index: HashMap::new(),
                last_modified: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    fn route(&self, id: &RecordId, partition_count: usize) -> usize {
        (xxh3_64(id.as_str().as_bytes()) % partition_count as u64) as usize
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    /// Next store-assigned modification timestamp. Strictly greater
    /// than every previously assigned one, even when the wall clock
    /// has not moved.
    fn next_modified(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if now <= self.last_modified {
            now = self.last_modified + Duration::microseconds(1);
        }
        self.last_modified = now;
        now
    }

    fn append(&mut self, partition: usize, id: RecordId, body: serde_json::Value) -> ChangeRecord {
        let modified = self.next_modified();
        let record = ChangeRecord::new(id, modified, body);

        let log = &mut self.partitions[partition];
        let lsn = log.next_lsn;
        log.next_lsn += 1;
        log.entries.push(LogEntry {
            lsn,
            record: record.clone(),
        });

        record
    }
}

#[async_trait]
impl ChangeFeedStore for MemoryStore {
    async fn list_partitions(
        &self,
        _continuation: Option<Continuation>,
    ) -> Result<PartitionPage, StoreError> {
        let inner = self.lock_read();
        Ok(PartitionPage {
            partitions: inner.partitions.iter().map(|p| p.id.clone()).collect(),
            continuation: None,
        })
    }

    async fn read_change_page(
        &self,
        partition: &PartitionId,
        options: &ReadOptions,
    ) -> Result<ChangePage, StoreError> {
        let inner = self.lock_read();
        let log = inner
            .partitions
            .iter()
            .find(|p| p.id == *partition)
            .ok_or_else(|| StoreError::PartitionGone(partition.clone()))?;

        let floor_lsn = match &options.continuation {
            Some(token) => Some(token.as_str().parse::<u64>().map_err(|_| {
                StoreError::BadContinuation(format!("'{token}' is not a sequence number"))
            })?),
            None => None,
        };

        let pending: Vec<&LogEntry> = log
            .entries
            .iter()
            .filter(|e| match floor_lsn {
                Some(floor) => e.lsn > floor,
                None => e.record.modified >= options.start_time,
            })
            .collect();

        let page_size = options.max_item_count.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let page: Vec<&LogEntry> = pending.iter().take(page_size).copied().collect();

        if page.is_empty() {
            // Caught up: echo the request token so an uncommitted
            // checkpoint stays where it was.
            return Ok(ChangePage {
                records: Vec::new(),
                continuation: options.continuation.clone(),
                has_more: false,
            });
        }

        let last_lsn = page.last().map(|e| e.lsn).unwrap_or_default();
        Ok(ChangePage {
            records: page.iter().map(|e| e.record.clone()).collect(),
            continuation: Some(Continuation::new(last_lsn.to_string())),
            has_more: pending.len() > page_size,
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(
        &self,
        id: RecordId,
        body: serde_json::Value,
    ) -> Result<ChangeRecord, StoreError> {
        let mut inner = self.lock_write();
        if inner.index.contains_key(&id) {
            return Err(StoreError::DocumentExists(id));
        }

        let partition = self.route(&id, inner.partitions.len());
        inner.index.insert(id.clone(), partition);
        Ok(inner.append(partition, id, body))
    }

    async fn replace_document(
        &self,
        id: &RecordId,
        body: serde_json::Value,
    ) -> Result<ChangeRecord, StoreError> {
        let mut inner = self.lock_write();
        let partition = *inner
            .index
            .get(id)
            .ok_or_else(|| StoreError::DocumentNotFound(id.clone()))?;

        // The rewrite moves the document to the tail of its
        // partition's change order.
        inner.partitions[partition]
            .entries
            .retain(|e| e.record.id != *id);
        Ok(inner.append(partition, id.clone(), body))
    }

    async fn read_document(&self, id: &RecordId) -> Result<ChangeRecord, StoreError> {
        let inner = self.lock_read();
        let partition = *inner
            .index
            .get(id)
            .ok_or_else(|| StoreError::DocumentNotFound(id.clone()))?;

        inner.partitions[partition]
            .entries
            .iter()
            .find(|e| e.record.id == *id)
            .map(|e| e.record.clone())
            .ok_or_else(|| StoreError::DocumentNotFound(id.clone()))
    }

    async fn delete_document(&self, id: &RecordId) -> Result<DeleteOutcome, StoreError> {
        let mut inner = self.lock_write();
        let Some(partition) = inner.index.remove(id) else {
            return Ok(DeleteOutcome::AlreadyAbsent);
        };

        inner.partitions[partition]
            .entries
            .retain(|e| e.record.id != *id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(start_time: DateTime<Utc>) -> ReadOptions {
        ReadOptions {
            start_time,
            continuation: None,
            max_item_count: None,
        }
    }

    async fn partition_of(store: &MemoryStore, id: &RecordId) -> PartitionId {
        let inner = store.lock_read();
        let idx = *inner.index.get(id).unwrap();
        inner.partitions[idx].id.clone()
    }

    #[tokio::test]
    async fn timestamps_are_strictly_increasing() {
        let store = MemoryStore::new(1);
        let a = store
            .insert_document(RecordId::new("a"), json!({}))
            .await
            .unwrap();
        let b = store
            .insert_document(RecordId::new("b"), json!({}))
            .await
            .unwrap();
        assert!(b.modified > a.modified);
    }

    #[tokio::test]
    async fn replace_moves_document_to_tail_of_change_order() {
        let store = MemoryStore::new(1);
        let id_a = RecordId::new("a");
        let id_b = RecordId::new("b");
        store.insert_document(id_a.clone(), json!({"v": 1})).await.unwrap();
        store.insert_document(id_b.clone(), json!({"v": 1})).await.unwrap();
        store.replace_document(&id_a, json!({"v": 2})).await.unwrap();

        let partition = partition_of(&store, &id_a).await;
        let page = store
            .read_change_page(&partition, &options(DateTime::<Utc>::MIN_UTC))
            .await
            .unwrap();

        let ids: Vec<&str> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(page.records[1].body, json!({"v": 2}));
    }

    #[tokio::test]
    async fn paging_reports_has_more_and_tokens_advance() {
        let store = MemoryStore::new(1);
        for i in 0..5 {
            store
                .insert_document(RecordId::new(format!("doc-{i}")), json!({}))
                .await
                .unwrap();
        }

        let partition = partition_of(&store, &RecordId::new("doc-0")).await;
        let mut opts = options(DateTime::<Utc>::MIN_UTC);
        opts.max_item_count = Some(2);

        let first = store.read_change_page(&partition, &opts).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.has_more);

        opts.continuation = first.continuation.clone();
        let second = store.read_change_page(&partition, &opts).await.unwrap();
        assert_eq!(second.records.len(), 2);
        assert!(second.has_more);
        assert_ne!(first.continuation, second.continuation);

        opts.continuation = second.continuation;
        let last = store.read_change_page(&partition, &opts).await.unwrap();
        assert_eq!(last.records.len(), 1);
        assert!(!last.has_more);
    }

    #[tokio::test]
    async fn empty_read_echoes_the_request_token() {
        let store = MemoryStore::new(1);
        let id = RecordId::new("only");
        store.insert_document(id.clone(), json!({})).await.unwrap();
        let partition = partition_of(&store, &id).await;

        let caught_up = store
            .read_change_page(&partition, &options(DateTime::<Utc>::MIN_UTC))
            .await
            .unwrap();
        assert!(!caught_up.has_more);

        let mut opts = options(DateTime::<Utc>::MIN_UTC);
        opts.continuation = caught_up.continuation.clone();
        let again = store.read_change_page(&partition, &opts).await.unwrap();
        assert!(again.records.is_empty());
        assert!(!again.has_more);
        assert_eq!(again.continuation, caught_up.continuation);
    }

    #[tokio::test]
    async fn unknown_partition_is_gone() {
        let store = MemoryStore::new(2);
        let err = store
            .read_change_page(
                &PartitionId::new("range-99"),
                &options(DateTime::<Utc>::MIN_UTC),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PartitionGone(_)));
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let store = MemoryStore::new(1);
        let mut opts = options(DateTime::<Utc>::MIN_UTC);
        opts.continuation = Some(Continuation::new("not-a-number"));
        let err = store
            .read_change_page(&PartitionId::new("range-0"), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BadContinuation(_)));
    }

    #[tokio::test]
    async fn delete_distinguishes_already_absent() {
        let store = MemoryStore::new(1);
        let id = RecordId::new("gone");
        store.insert_document(id.clone(), json!({})).await.unwrap();

        assert_eq!(
            store.delete_document(&id).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            store.delete_document(&id).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }
}
