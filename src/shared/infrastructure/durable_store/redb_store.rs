//! redb implementation of the DurableStore port.
//!
//! Tables:
//! - `events`: event id -> JSON encoded envelope
//! - `events_by_stream`: (stream id, stream position) -> event id, the ordered secondary index
//! - `stream_counters`: stream type -> number of streams minted
//!
//! redb admits a single write transaction at a time, so every unit of work is serialized
//! against all other writers of the same database.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, Table, TableDefinition, WriteTransaction};
use tracing::{debug, info, instrument};

use crate::shared::core::primitives::{EventEnvelope, StreamCounter};
use crate::shared::infrastructure::durable_store::{DurableStore, StoreError, UnitOfWork};

const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("events");

const EVENTS_BY_STREAM: TableDefinition<(&str, u64), &str> =
    TableDefinition::new("events_by_stream");

const STREAM_COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("stream_counters");

/// Configuration for the redb store
#[derive(Debug, Clone)]
pub struct RedbStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/event-streams.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

pub struct RedbDurableStore {
    db: Arc<Database>,
}

impl RedbDurableStore {
    /// Open or create the database and its tables
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::backend)?;
            }
        }

        let db = Database::builder()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(StoreError::backend)?;

        info!("Opened event store database");

        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    /// Creates the tables if they don't exist yet
    fn init_tables(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(StoreError::backend)?;
        txn.open_table(EVENTS).map_err(StoreError::backend)?;
        txn.open_table(EVENTS_BY_STREAM)
            .map_err(StoreError::backend)?;
        txn.open_table(STREAM_COUNTERS)
            .map_err(StoreError::backend)?;
        txn.commit().map_err(StoreError::backend)?;

        debug!("Initialized event store tables");
        Ok(())
    }

    async fn read<T, F>(&self, read: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || read(&db))
            .await
            .map_err(StoreError::backend)?
    }
}

struct RedbUnitOfWork<'txn> {
    events: Table<'txn, &'static str, &'static [u8]>,
    events_by_stream: Table<'txn, (&'static str, u64), &'static str>,
    stream_counters: Table<'txn, &'static str, u64>,
}

impl<'txn> RedbUnitOfWork<'txn> {
    fn open(txn: &'txn WriteTransaction) -> Result<Self, StoreError> {
        Ok(Self {
            events: txn.open_table(EVENTS).map_err(StoreError::backend)?,
            events_by_stream: txn
                .open_table(EVENTS_BY_STREAM)
                .map_err(StoreError::backend)?,
            stream_counters: txn
                .open_table(STREAM_COUNTERS)
                .map_err(StoreError::backend)?,
        })
    }
}

impl UnitOfWork for RedbUnitOfWork<'_> {
    fn events_for_stream(&self, stream_id: &str) -> Result<Vec<EventEnvelope>, StoreError> {
        collect_stream(&self.events_by_stream, &self.events, stream_id)
    }

    fn get_event(&self, event_id: &str) -> Result<Option<EventEnvelope>, StoreError> {
        fetch_event(&self.events, event_id)
    }

    fn insert_event(&mut self, envelope: &EventEnvelope) -> Result<(), StoreError> {
        let exists = self
            .events
            .get(envelope.event_id.as_str())
            .map_err(StoreError::backend)?
            .is_some();
        if exists {
            return Err(StoreError::DuplicateEvent(envelope.event_id.clone()));
        }
        let occupied = self
            .events_by_stream
            .get((envelope.stream_id.as_str(), envelope.stream_position))
            .map_err(StoreError::backend)?
            .is_some();
        if occupied {
            return Err(StoreError::DuplicatePosition(
                envelope.stream_id.clone(),
                envelope.stream_position,
            ));
        }

        let bytes = serde_json::to_vec(envelope)?;
        self.events
            .insert(envelope.event_id.as_str(), bytes.as_slice())
            .map_err(StoreError::backend)?;
        self.events_by_stream
            .insert(
                (envelope.stream_id.as_str(), envelope.stream_position),
                envelope.event_id.as_str(),
            )
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn get_counter(&self, stream_type: &str) -> Result<Option<StreamCounter>, StoreError> {
        fetch_counter(&self.stream_counters, stream_type)
    }

    fn put_counter(&mut self, counter: &StreamCounter) -> Result<(), StoreError> {
        self.stream_counters
            .insert(counter.stream_type.as_str(), counter.count)
            .map_err(StoreError::backend)?;
        Ok(())
    }
}

fn fetch_event(
    events: &impl ReadableTable<&'static str, &'static [u8]>,
    event_id: &str,
) -> Result<Option<EventEnvelope>, StoreError> {
    let Some(bytes) = events.get(event_id).map_err(StoreError::backend)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_slice(bytes.value())?))
}

fn collect_stream(
    index: &impl ReadableTable<(&'static str, u64), &'static str>,
    events: &impl ReadableTable<&'static str, &'static [u8]>,
    stream_id: &str,
) -> Result<Vec<EventEnvelope>, StoreError> {
    let range = index
        .range((stream_id, 0u64)..=(stream_id, u64::MAX))
        .map_err(StoreError::backend)?;

    let mut stream = Vec::new();
    for entry in range {
        let (_, event_id) = entry.map_err(StoreError::backend)?;
        let event_id = event_id.value();
        let envelope = fetch_event(events, event_id)?.ok_or_else(|| {
            StoreError::Backend(format!("index entry points at missing event {event_id}"))
        })?;
        stream.push(envelope);
    }
    Ok(stream)
}

fn fetch_counter(
    counters: &impl ReadableTable<&'static str, u64>,
    stream_type: &str,
) -> Result<Option<StreamCounter>, StoreError> {
    Ok(counters
        .get(stream_type)
        .map_err(StoreError::backend)?
        .map(|count| StreamCounter {
            stream_type: stream_type.to_string(),
            count: count.value(),
        }))
}

#[async_trait]
impl DurableStore for RedbDurableStore {
    async fn transact<T, E, F>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, E> + Send + 'static,
    {
        let db = self.db.clone();
        let outcome = tokio::task::spawn_blocking(move || -> Result<T, E> {
            let txn = db.begin_write().map_err(StoreError::backend)?;
            let result = {
                let mut uow = RedbUnitOfWork::open(&txn)?;
                work(&mut uow)
            };
            match result {
                Ok(value) => {
                    txn.commit().map_err(StoreError::backend)?;
                    Ok(value)
                }
                Err(err) => {
                    txn.abort().map_err(StoreError::backend)?;
                    Err(err)
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(join_error) => Err(StoreError::backend(join_error).into()),
        }
    }

    async fn load_stream(&self, stream_id: &str) -> Result<Vec<EventEnvelope>, StoreError> {
        let stream_id = stream_id.to_string();
        self.read(move |db| {
            let txn = db.begin_read().map_err(StoreError::backend)?;
            let index = txn
                .open_table(EVENTS_BY_STREAM)
                .map_err(StoreError::backend)?;
            let events = txn.open_table(EVENTS).map_err(StoreError::backend)?;
            collect_stream(&index, &events, &stream_id)
        })
        .await
    }

    async fn load_counter(&self, stream_type: &str) -> Result<Option<StreamCounter>, StoreError> {
        let stream_type = stream_type.to_string();
        self.read(move |db| {
            let txn = db.begin_read().map_err(StoreError::backend)?;
            let counters = txn
                .open_table(STREAM_COUNTERS)
                .map_err(StoreError::backend)?;
            fetch_counter(&counters, &stream_type)
        })
        .await
    }
}
