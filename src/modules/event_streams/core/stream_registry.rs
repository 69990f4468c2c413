// Stream registry: mints sequence numbers for new streams of a stream type.
//
// Responsibilities
// - Read the counter (absent means 0), write back current + 1, return it.
// - Run inside the unit of work of the insert it supports, so both commit or both roll back.
// - Never decrement or delete a counter.

use tracing::debug;

use crate::shared::core::primitives::StreamCounter;
use crate::shared::infrastructure::durable_store::{StoreError, UnitOfWork};

pub fn allocate(uow: &mut dyn UnitOfWork, stream_type: &str) -> Result<u64, StoreError> {
    let current = uow
        .get_counter(stream_type)?
        .map(|counter| counter.count)
        .unwrap_or(0);
    let next = current + 1;
    uow.put_counter(&StreamCounter {
        stream_type: stream_type.to_string(),
        count: next,
    })?;
    debug!(stream_type, sequence = next, "Allocated stream sequence number");
    Ok(next)
}
