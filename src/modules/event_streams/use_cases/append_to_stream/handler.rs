// Append-to-existing-stream command handler.
//
// Responsibilities
// - Run the concurrency guard and the insert as one unit of work.
// - On commit, announce the stream change and return the stored envelope.
// - On conflict, return the concurrency error and announce nothing.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::modules::event_streams::core::concurrency_guard::guard_append;
use crate::modules::event_streams::core::errors::AppendError;
use crate::shared::core::primitives::EventEnvelope;
use crate::shared::infrastructure::change_notifier::ChangeNotifier;
use crate::shared::infrastructure::durable_store::DurableStore;

pub struct AppendToStreamHandler<TStore, TNotifier>
where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    store: Arc<TStore>,
    notifier: Arc<TNotifier>,
}

impl<TStore, TNotifier> AppendToStreamHandler<TStore, TNotifier>
where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    pub fn new(store: Arc<TStore>, notifier: Arc<TNotifier>) -> Self {
        Self { store, notifier }
    }

    #[instrument(
        skip(self, envelope),
        fields(stream_id = %envelope.stream_id, stream_position = envelope.stream_position)
    )]
    pub async fn handle(&self, envelope: EventEnvelope) -> Result<EventEnvelope, AppendError> {
        let stored = self
            .store
            .transact(move |uow| guard_append(uow, envelope))
            .await
            .inspect_err(|err| {
                if let AppendError::Transaction(message) = err {
                    error!(error = %message, "Transaction error while appending to stream");
                }
            })?;
        info!(event_id = %stored.event_id, "Event persisted");
        self.notifier.publish(&stored.stream_id).await;
        Ok(stored)
    }
}
