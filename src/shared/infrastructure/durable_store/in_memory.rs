// In memory implementation of the DurableStore port.
//
// Purpose
// - Support handler and session tests and local development without a database file.
//
// Responsibilities
// - Keep both containers in memory behind a single writer lock.
// - Run each unit of work against a staged copy and swap it in on commit, so an aborted unit leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::shared::core::primitives::{EventEnvelope, StreamCounter};
use crate::shared::infrastructure::durable_store::{DurableStore, StoreError, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    events: HashMap<String, EventEnvelope>,
    events_by_stream: BTreeMap<(String, u64), String>,
    stream_counters: HashMap<String, u64>,
}

struct MemoryUnitOfWork<'a> {
    state: &'a mut MemoryState,
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn events_for_stream(&self, stream_id: &str) -> Result<Vec<EventEnvelope>, StoreError> {
        Ok(read_stream(self.state, stream_id))
    }

    fn get_event(&self, event_id: &str) -> Result<Option<EventEnvelope>, StoreError> {
        Ok(self.state.events.get(event_id).cloned())
    }

    fn insert_event(&mut self, envelope: &EventEnvelope) -> Result<(), StoreError> {
        if self.state.events.contains_key(&envelope.event_id) {
            return Err(StoreError::DuplicateEvent(envelope.event_id.clone()));
        }
        let slot = (envelope.stream_id.clone(), envelope.stream_position);
        if self.state.events_by_stream.contains_key(&slot) {
            return Err(StoreError::DuplicatePosition(slot.0, slot.1));
        }
        self.state
            .events
            .insert(envelope.event_id.clone(), envelope.clone());
        self.state
            .events_by_stream
            .insert(slot, envelope.event_id.clone());
        Ok(())
    }

    fn get_counter(&self, stream_type: &str) -> Result<Option<StreamCounter>, StoreError> {
        Ok(self
            .state
            .stream_counters
            .get(stream_type)
            .map(|count| StreamCounter {
                stream_type: stream_type.to_string(),
                count: *count,
            }))
    }

    fn put_counter(&mut self, counter: &StreamCounter) -> Result<(), StoreError> {
        self.state
            .stream_counters
            .insert(counter.stream_type.clone(), counter.count);
        Ok(())
    }
}

fn read_stream(state: &MemoryState, stream_id: &str) -> Vec<EventEnvelope> {
    state
        .events_by_stream
        .range((stream_id.to_string(), 0)..=(stream_id.to_string(), u64::MAX))
        .filter_map(|(_, event_id)| state.events.get(event_id).cloned())
        .collect()
}

#[derive(Default)]
pub struct InMemoryDurableStore {
    state: Mutex<MemoryState>,
    offline: bool,
    delay_commit_ms: AtomicU64,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.offline = !self.offline;
    }

    /// Holds the writer lock for `ms` before each commit.
    pub fn set_delay_commit_ms(&self, ms: u64) {
        self.delay_commit_ms.store(ms, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Backend("Durable store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn transact<T, E, F>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, E> + Send + 'static,
    {
        self.ensure_online()?;
        let mut guard = self.state.lock().await;
        let mut staged = guard.clone();
        let value = {
            let mut uow = MemoryUnitOfWork { state: &mut staged };
            work(&mut uow)?
        };
        let delay = self.delay_commit_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        *guard = staged;
        Ok(value)
    }

    async fn load_stream(&self, stream_id: &str) -> Result<Vec<EventEnvelope>, StoreError> {
        self.ensure_online()?;
        let guard = self.state.lock().await;
        Ok(read_stream(&guard, stream_id))
    }

    async fn load_counter(&self, stream_type: &str) -> Result<Option<StreamCounter>, StoreError> {
        self.ensure_online()?;
        let guard = self.state.lock().await;
        Ok(guard
            .stream_counters
            .get(stream_type)
            .map(|count| StreamCounter {
                stream_type: stream_type.to_string(),
                count: *count,
            }))
    }
}
