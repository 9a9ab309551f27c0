use crate::store::schema::SuggestionStatus;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access update store at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("update store at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to encode update store: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("batch must contain at least one suggestion")]
    EmptyBatch,

    #[error("batch not found: {0}")]
    BatchNotFound(String),

    #[error("suggestion not found: {0}")]
    SuggestionNotFound(String),

    #[error("applied update not found: {0}")]
    UpdateNotFound(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("suggestion {suggestion_id} is {actual}, expected {expected}")]
    StatusMismatch {
        suggestion_id: String,
        expected: SuggestionStatus,
        actual: SuggestionStatus,
    },

    #[error("suggestion {suggestion_id} cannot move from {from} to {to}")]
    IllegalTransition {
        suggestion_id: String,
        from: SuggestionStatus,
        to: SuggestionStatus,
    },

    #[error("suggestion {suggestion_id} already has applied update {update_id}")]
    AlreadyApplied {
        suggestion_id: String,
        update_id: String,
    },
}
