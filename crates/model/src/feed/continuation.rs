use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque continuation token marking the resume position within one
/// partition's change feed.
///
/// Callers must treat the contents as meaningless: tokens are minted by
/// the store, compared only for equality, and handed back verbatim on
/// the next read. `None` in the surrounding APIs means "start from the
/// configured origin".
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Continuation(String);

impl Continuation {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
