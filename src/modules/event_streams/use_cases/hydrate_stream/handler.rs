// Hydrate-stream query handler: loads every event of one stream, ordered by position.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::shared::core::primitives::EventEnvelope;
use crate::shared::infrastructure::durable_store::{DurableStore, StoreError};

pub struct HydrateStreamHandler<TStore>
where
    TStore: DurableStore,
{
    store: Arc<TStore>,
}

impl<TStore> HydrateStreamHandler<TStore>
where
    TStore: DurableStore,
{
    pub fn new(store: Arc<TStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn handle(&self, stream_id: &str) -> Result<Vec<EventEnvelope>, StoreError> {
        let events = self.store.load_stream(stream_id).await?;
        debug!(count = events.len(), "Hydrated stream");
        Ok(events)
    }
}
