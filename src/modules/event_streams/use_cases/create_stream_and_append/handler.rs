// Create-stream-and-append command handler.
//
// Responsibilities
// - In one unit of work: allocate the next sequence number for the stream type, derive the stream id,
//   set position 1 and insert the event.
// - On commit, announce the new stream and return the finalized envelope.
// - Any storage failure rolls the allocation back with the insert.
//
// A freshly minted stream id has no events yet, so no position check is needed.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::modules::event_streams::core::errors::AppendError;
use crate::modules::event_streams::core::stream_registry::allocate;
use crate::modules::event_streams::use_cases::create_stream_and_append::command::CreateStreamAndAppend;
use crate::shared::core::primitives::{EventEnvelope, stream_id_for};
use crate::shared::infrastructure::change_notifier::ChangeNotifier;
use crate::shared::infrastructure::durable_store::DurableStore;

pub struct CreateStreamHandler<TStore, TNotifier>
where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    store: Arc<TStore>,
    notifier: Arc<TNotifier>,
}

impl<TStore, TNotifier> CreateStreamHandler<TStore, TNotifier>
where
    TStore: DurableStore,
    TNotifier: ChangeNotifier,
{
    pub fn new(store: Arc<TStore>, notifier: Arc<TNotifier>) -> Self {
        Self { store, notifier }
    }

    #[instrument(skip(self, command), fields(stream_type = %command.stream_type))]
    pub async fn handle(&self, command: CreateStreamAndAppend) -> Result<EventEnvelope, AppendError> {
        let CreateStreamAndAppend {
            stream_type,
            envelope,
        } = command;
        let stored = self
            .store
            .transact(move |uow| -> Result<EventEnvelope, AppendError> {
                let sequence = allocate(uow, &stream_type)?;
                let envelope = envelope.into_envelope(stream_id_for(&stream_type, sequence), 1);
                uow.insert_event(&envelope)?;
                Ok(envelope)
            })
            .await
            .inspect_err(|err| error!(error = %err, "Transaction error while creating stream"))?;
        info!(
            event_id = %stored.event_id,
            stream_id = %stored.stream_id,
            "New stream event persisted"
        );
        self.notifier.publish(&stored.stream_id).await;
        Ok(stored)
    }
}
