use crate::{error::StoreError, store::ChangeFeedStore};
use async_trait::async_trait;
use model::feed::{
    continuation::Continuation,
    options::ReadOptions,
    page::{ChangePage, PartitionPage},
    record::PartitionId,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fault-injection wrapper: fails the next N page reads with a
/// transient error before delegating again. Used to exercise retry
/// paths without a real network.
pub struct FlakyStore<S> {
    inner: S,
    failures_left: AtomicUsize,
    reads_attempted: AtomicUsize,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(0),
            reads_attempted: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn reads_attempted(&self) -> usize {
        self.reads_attempted.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ChangeFeedStore> ChangeFeedStore for FlakyStore<S> {
    async fn list_partitions(
        &self,
        continuation: Option<Continuation>,
    ) -> Result<PartitionPage, StoreError> {
        self.inner.list_partitions(continuation).await
    }

    async fn read_change_page(
        &self,
        partition: &PartitionId,
        options: &ReadOptions,
    ) -> Result<ChangePage, StoreError> {
        self.reads_attempted.fetch_add(1, Ordering::SeqCst);

        let remaining = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if remaining {
            return Err(StoreError::Transient("injected read failure".to_string()));
        }

        self.inner.read_change_page(partition, options).await
    }
}
