// Durable store port: the transactional storage substrate under the event streams.
//
// Purpose
// - Describe the two containers (events, stream counters) and the unit of work that groups operations on them.
//
// Responsibilities
// - `transact` runs a unit of work all-or-nothing. Returning Err from the work aborts it and nothing is written.
// - Units of work never interleave with each other. A read-then-write inside one unit is safe against other writers.
// - Events are insert-only. An existing event id, or an occupied (stream id, position) slot, is a storage
//   failure, never an overwrite.
//
// Boundaries
// - No concurrency or allocation rules here. Those live in the event streams core and run inside a unit of work.

use async_trait::async_trait;
use thiserror::Error;

use crate::shared::core::primitives::{EventEnvelope, StreamCounter};

pub mod in_memory;
pub mod lazy;
pub mod redb_store;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("event {0} already exists")]
    DuplicateEvent(String),

    #[error("stream {0} already has an event at position {1}")]
    DuplicatePosition(String, u64),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Operations available inside one unit of work.
pub trait UnitOfWork {
    /// Events of `stream_id` ordered by stream position.
    fn events_for_stream(&self, stream_id: &str) -> Result<Vec<EventEnvelope>, StoreError>;

    fn get_event(&self, event_id: &str) -> Result<Option<EventEnvelope>, StoreError>;

    fn insert_event(&mut self, envelope: &EventEnvelope) -> Result<(), StoreError>;

    fn get_counter(&self, stream_type: &str) -> Result<Option<StreamCounter>, StoreError>;

    fn put_counter(&mut self, counter: &StreamCounter) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DurableStore: Send + Sync + 'static {
    /// Runs `work` as a single unit of work. `Ok` commits, `Err` aborts.
    /// Storage failures, including a failed commit, reach the caller through `E: From<StoreError>`.
    async fn transact<T, E, F>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, E> + Send + 'static;

    async fn load_stream(&self, stream_id: &str) -> Result<Vec<EventEnvelope>, StoreError>;

    async fn load_counter(&self, stream_type: &str) -> Result<Option<StreamCounter>, StoreError>;
}
