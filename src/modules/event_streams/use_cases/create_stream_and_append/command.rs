// Command data type for creating a stream and appending its first event.
//
// Purpose
// - Express the intent to start a new stream of `stream_type` with `envelope` as its first event.
//
// Responsibilities
// - Carry the event without a stream identity. The handler assigns the stream id and position 1.

use serde::{Deserialize, Serialize};

use crate::shared::core::primitives::EventTemplate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStreamAndAppend {
    pub stream_type: String,
    pub envelope: EventTemplate,
}

impl CreateStreamAndAppend {
    pub fn new(stream_type: impl Into<String>, envelope: EventTemplate) -> Self {
        Self {
            stream_type: stream_type.into(),
            envelope,
        }
    }
}
