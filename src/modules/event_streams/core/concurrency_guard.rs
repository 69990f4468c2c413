// Optimistic append check.
//
// Responsibilities
// - Find the highest position stored for the envelope's stream (0 when the stream is empty).
// - Insert the envelope only if its declared position is exactly that + 1.
// - Otherwise fail with a concurrency error so the enclosing unit of work aborts and nothing is written.
//
// Gaps and duplicates are rejected alike. The check and the insert must share one unit of work.

use tracing::warn;

use crate::modules::event_streams::core::errors::AppendError;
use crate::shared::core::primitives::EventEnvelope;
use crate::shared::infrastructure::durable_store::{StoreError, UnitOfWork};

pub fn current_position(uow: &dyn UnitOfWork, stream_id: &str) -> Result<u64, StoreError> {
    Ok(uow
        .events_for_stream(stream_id)?
        .iter()
        .map(|event| event.stream_position)
        .max()
        .unwrap_or(0))
}

pub fn guard_append(
    uow: &mut dyn UnitOfWork,
    envelope: EventEnvelope,
) -> Result<EventEnvelope, AppendError> {
    let current = current_position(uow, &envelope.stream_id)?;
    if envelope.stream_position != current + 1 {
        warn!(
            stream_id = %envelope.stream_id,
            expected = current + 1,
            declared = envelope.stream_position,
            "Concurrency check failed"
        );
        return Err(AppendError::Concurrency {
            stream_id: envelope.stream_id,
            declared: envelope.stream_position,
            current,
        });
    }
    uow.insert_event(&envelope)?;
    Ok(envelope)
}
