use crate::feed::continuation::Continuation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request options for a single change-page read.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Earliest modification time to include when no continuation is
    /// supplied. Ignored once `continuation` is set.
    pub start_time: DateTime<Utc>,
    /// Resume token from a previous page; takes precedence over
    /// `start_time`.
    pub continuation: Option<Continuation>,
    /// Maximum records per page. `None` lets the store choose.
    pub max_item_count: Option<usize>,
}

/// Configuration for a change-feed cursor.
///
/// Passed explicitly at construction; there is no ambient global
/// configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed origin: only changes committed at or after this instant are
    /// read when starting without a checkpoint.
    pub start_time: DateTime<Utc>,
    /// Page size hint forwarded to the store.
    pub max_item_count: Option<usize>,
}

impl FeedConfig {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            max_item_count: None,
        }
    }

    pub fn with_max_item_count(mut self, count: usize) -> Self {
        self.max_item_count = Some(count);
        self
    }
}
