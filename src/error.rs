// ⚠️ Error taxonomy for the batch runner
//
// NotFound is not here on purpose: a BIN lookup that misses is a normal
// outcome and comes back as `None` from `BinTable::resolve`.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BatchError {
    /// Caller misuse: double start, empty item list, reset while running
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Classifier produced a category tag the runner was not configured with
    #[error("contract violation: unknown category '{category}' for item {item_index}")]
    ContractViolation { category: String, item_index: usize },

    /// Classifier itself returned an error
    #[error("classifier failed on item {item_index}: {message}")]
    ClassifierFailed { item_index: usize, message: String },
}

impl BatchError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        BatchError::InvalidArgument(msg.into())
    }

    /// True for errors that abort a run (as opposed to rejected calls)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BatchError::InvalidArgument(_))
    }
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;
