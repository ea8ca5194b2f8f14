use feed_core::error::{StateError, StoreError};
use feed_runtime::error::FeedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Checkpoint store error: {0}")]
    State(#[from] StateError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}
