use chrono::{DateTime, Utc};
use model::feed::{continuation::Continuation, record::PartitionId};
use serde::{Deserialize, Serialize};

/// Persisted resume position for one partition's change feed.
///
/// `continuation == None` means no page has been committed yet; a
/// resumed read starts from the configured feed origin.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub partition: PartitionId,
    pub continuation: Option<Continuation>,
    /// Total records consumed up to `continuation`. Monotonically
    /// non-decreasing; backends use it to refuse stale overwrites.
    pub records_done: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(partition: PartitionId, continuation: Option<Continuation>, records_done: u64) -> Self {
        Self {
            partition,
            continuation,
            records_done,
            updated_at: Utc::now(),
        }
    }
}
