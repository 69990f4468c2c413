// Persisted data model shared by every component.
//
// Purpose
// - EventEnvelope: the atomic unit of persisted history.
// - EventTemplate: an envelope whose stream identity is assigned at append time.
// - StreamCounter: per stream type allocation state.
//
// Serialized field names (camelCase) form the logical schema of the store and of the host messages.
//
// Timestamps
// - All i64 values use epoch milliseconds.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub stream_id: String,
    pub stream_position: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventTemplate {
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

impl EventTemplate {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn into_envelope(self, stream_id: impl Into<String>, stream_position: u64) -> EventEnvelope {
        EventEnvelope {
            event_id: self.event_id,
            stream_id: stream_id.into(),
            stream_position,
            event_type: self.event_type,
            payload: self.payload,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamCounter {
    pub stream_type: String,
    pub count: u64,
}

/// Formats the identifier minted for the `sequence`-th stream of `stream_type`.
pub fn stream_id_for(stream_type: &str, sequence: u64) -> String {
    format!("{stream_type}-{sequence}")
}
