use crate::error::FeedError;
use chrono::{DateTime, Utc};
use feed_core::{
    error::{StoreError, classify_store_error},
    metrics::FeedMetrics,
    retry::{RetryDisposition, RetryError, RetryPolicy},
    state::Checkpoint,
    store::ChangeFeedStore,
};
use model::feed::{
    continuation::Continuation,
    options::{FeedConfig, ReadOptions},
    page::ChangePage,
    record::{ChangeRecord, PartitionId},
};
use std::{collections::VecDeque, sync::Arc};
use tracing::debug;

/// Why a cutoff-bounded drain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A record past the cutoff was encountered; stopped by policy.
    CutoffReached,
    /// Caught up with all currently available changes.
    Exhausted,
    /// Stopped by the caller's cancellation token.
    Cancelled,
}

/// Reads one partition's change feed as a restartable sequence of
/// pages and records.
///
/// The cursor itself is stateless across partitions; per-partition
/// position lives in the [`FeedIterator`] it hands out. Transient read
/// failures are retried with the continuation unchanged; everything
/// else surfaces immediately.
pub struct ChangeFeedCursor {
    store: Arc<dyn ChangeFeedStore>,
    config: FeedConfig,
    retry: RetryPolicy,
    metrics: FeedMetrics,
}

impl ChangeFeedCursor {
    pub fn new(
        store: Arc<dyn ChangeFeedStore>,
        config: FeedConfig,
        retry: RetryPolicy,
        metrics: FeedMetrics,
    ) -> Self {
        Self {
            store,
            config,
            retry,
            metrics,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ChangeFeedStore> {
        Arc::clone(&self.store)
    }

    /// Begins (or, given a checkpoint, resumes) a read over one
    /// partition's change feed starting at the configured feed origin.
    ///
    /// The partition is verified against the store's current partition
    /// listing; a vanished partition surfaces as
    /// [`StoreError::PartitionGone`].
    pub async fn open(
        &self,
        partition: PartitionId,
        checkpoint: Option<Checkpoint>,
    ) -> Result<FeedIterator, FeedError> {
        let mut listing_token = None;
        loop {
            let page = self.store.list_partitions(listing_token).await?;
            if page.partitions.contains(&partition) {
                break;
            }
            match page.continuation {
                Some(next) => listing_token = Some(next),
                None => return Err(StoreError::PartitionGone(partition).into()),
            }
        }

        let (committed, committed_records) = match checkpoint {
            Some(cp) => (cp.continuation, cp.records_done),
            None => (None, 0),
        };

        debug!(
            partition = %partition,
            resumed = committed.is_some(),
            "Opened change-feed iterator"
        );

        Ok(FeedIterator {
            partition,
            fetch_position: committed.clone(),
            committed,
            committed_records,
            buffered: VecDeque::new(),
            page_token: None,
            page_consumed: 0,
            has_more: true,
            outcome: None,
        })
    }

    /// Fetches the next raw page, advancing the iterator's fetch
    /// position but not its committed checkpoint. Callers that consume
    /// the page in full commit it with [`FeedIterator::commit_page`].
    pub async fn next_page(&self, iter: &mut FeedIterator) -> Result<ChangePage, FeedError> {
        let page = self.fetch(iter).await?;
        iter.fetch_position = page.continuation.clone();
        iter.has_more = page.has_more;
        Ok(page)
    }

    /// Lazily produces the next record at or before `cutoff`.
    ///
    /// Pages are fetched on demand; a page's continuation is committed
    /// only once its last record has been handed out. The first record
    /// with modification time strictly past the cutoff is not emitted
    /// and ends the drain: the rest of its page and that page's
    /// continuation are discarded for this pass.
    ///
    /// Returns `Ok(None)` once the drain has stopped; the reason is
    /// available from [`FeedIterator::outcome`].
    pub async fn next_record(
        &self,
        iter: &mut FeedIterator,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<ChangeRecord>, FeedError> {
        loop {
            if iter.outcome.is_some() {
                return Ok(None);
            }

            if let Some(record) = iter.buffered.pop_front() {
                if record.modified > cutoff {
                    debug!(
                        partition = %iter.partition,
                        record = %record.id,
                        modified = %record.modified,
                        cutoff = %cutoff,
                        "Record past cutoff, stopping partition drain"
                    );
                    iter.stop(DrainOutcome::CutoffReached);
                    return Ok(None);
                }

                iter.page_consumed += 1;
                if iter.buffered.is_empty() {
                    iter.commit_buffered_page();
                }
                return Ok(Some(record));
            }

            if !iter.has_more {
                iter.outcome = Some(DrainOutcome::Exhausted);
                return Ok(None);
            }

            let page = self.next_page(iter).await?;
            if page.records.is_empty() {
                if !page.has_more {
                    iter.outcome = Some(DrainOutcome::Exhausted);
                    return Ok(None);
                }
                continue;
            }

            iter.page_token = page.continuation.clone();
            iter.page_consumed = 0;
            iter.buffered = page.records.into();
        }
    }

    /// Convenience over [`next_record`](Self::next_record): drains the
    /// partition to the cutoff and collects everything emitted. The
    /// stop reason is left on the iterator.
    pub async fn advance_until_cutoff(
        &self,
        iter: &mut FeedIterator,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ChangeRecord>, FeedError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record(iter, cutoff).await? {
            records.push(record);
        }
        Ok(records)
    }

    async fn fetch(&self, iter: &FeedIterator) -> Result<ChangePage, FeedError> {
        let options = ReadOptions {
            start_time: self.config.start_time,
            continuation: iter.fetch_position.clone(),
            max_item_count: self.config.max_item_count,
        };

        let store = Arc::clone(&self.store);
        let partition = iter.partition.clone();
        let metrics = self.metrics.clone();

        let result = self
            .retry
            .run(
                || {
                    let store = Arc::clone(&store);
                    let partition = partition.clone();
                    let options = options.clone();
                    async move { store.read_change_page(&partition, &options).await }
                },
                |err| {
                    let disposition = classify_store_error(err);
                    if disposition == RetryDisposition::Retry {
                        metrics.increment_retries(1);
                    }
                    disposition
                },
            )
            .await;

        match result {
            Ok(page) => {
                self.metrics.increment_pages(1);
                Ok(page)
            }
            Err(RetryError::Fatal(err)) => {
                self.metrics.increment_failures(1);
                Err(err.into())
            }
            Err(RetryError::AttemptsExceeded(err)) => {
                self.metrics.increment_failures(1);
                Err(FeedError::RetriesExhausted {
                    partition: iter.partition.clone(),
                    source: err,
                })
            }
        }
    }
}

/// Position state for one partition's read.
///
/// Tracks two separate marks: the fetch position (where the next page
/// read starts) and the committed checkpoint (the last fully-processed
/// page). Only the committed mark is ever exposed for persistence, so
/// abandoning an in-flight page can never advance a checkpoint.
#[derive(Debug)]
pub struct FeedIterator {
    partition: PartitionId,
    fetch_position: Option<Continuation>,
    committed: Option<Continuation>,
    committed_records: u64,
    buffered: VecDeque<ChangeRecord>,
    page_token: Option<Continuation>,
    page_consumed: u64,
    has_more: bool,
    outcome: Option<DrainOutcome>,
}

impl FeedIterator {
    pub fn partition(&self) -> &PartitionId {
        &self.partition
    }

    /// Last committed resume position, suitable for external
    /// persistence.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(
            self.partition.clone(),
            self.committed.clone(),
            self.committed_records,
        )
    }

    pub fn records_done(&self) -> u64 {
        self.committed_records
    }

    /// Why the drain stopped; `None` while records may still be
    /// produced.
    pub fn outcome(&self) -> Option<DrainOutcome> {
        self.outcome
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Marks a page returned by [`ChangeFeedCursor::next_page`] as
    /// fully processed, promoting its continuation to the committed
    /// checkpoint.
    pub fn commit_page(&mut self, page: &ChangePage) {
        if let Some(token) = &page.continuation {
            self.committed = Some(token.clone());
        }
        self.committed_records += page.records.len() as u64;
    }

    /// Stops the drain, discarding any partially consumed page and
    /// rewinding the fetch position to the committed checkpoint.
    pub(crate) fn stop(&mut self, outcome: DrainOutcome) {
        self.outcome = Some(outcome);
        self.buffered.clear();
        self.page_token = None;
        self.page_consumed = 0;
        self.fetch_position = self.committed.clone();
    }

    fn commit_buffered_page(&mut self) {
        if let Some(token) = self.page_token.take() {
            self.committed = Some(token);
        }
        self.committed_records += self.page_consumed;
        self.page_consumed = 0;
    }
}
