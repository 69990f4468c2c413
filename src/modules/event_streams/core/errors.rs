// Typed failures returned to the host for every append attempt.
//
// - Concurrency: the declared position is not current + 1. Recoverable: re-read the stream and retry.
// - Transaction: the storage engine failed. Surfaced with the engine's message, not recoverable locally.
// - StoreUnavailable: the store could not be opened, so the command never ran.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::infrastructure::durable_store::StoreError;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "args")]
pub enum AppendError {
    #[error("concurrency conflict on {stream_id}: declared position {declared}, current position {current}")]
    #[serde(rename = "ConcurrencyError", rename_all = "camelCase")]
    Concurrency {
        stream_id: String,
        declared: u64,
        current: u64,
    },

    #[error("transaction failed: {0}")]
    #[serde(rename = "TransactionError")]
    Transaction(String),

    #[error("store unavailable: {0}")]
    #[serde(rename = "StoreUnavailable")]
    StoreUnavailable(String),
}

impl From<StoreError> for AppendError {
    fn from(err: StoreError) -> Self {
        Self::Transaction(err.to_string())
    }
}
