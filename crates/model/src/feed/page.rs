use crate::feed::{
    continuation::Continuation,
    record::{ChangeRecord, PartitionId},
};

/// One batch of change-feed results for a partition.
#[derive(Clone, Debug)]
pub struct ChangePage {
    pub records: Vec<ChangeRecord>,
    /// Resume token for the read *after* this page. Equal to the
    /// request's token when the page is empty, so an uncommitted
    /// checkpoint is never silently advanced.
    pub continuation: Option<Continuation>,
    /// `false` means "caught up with currently available changes", not
    /// "end of partition"; new changes may appear on a later poll.
    pub has_more: bool,
}

impl ChangePage {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One batch of partition identifiers, paged the same way change
/// results are.
#[derive(Clone, Debug)]
pub struct PartitionPage {
    pub partitions: Vec<PartitionId>,
    pub continuation: Option<Continuation>,
}
