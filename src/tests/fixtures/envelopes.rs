// Shared test fixture for event envelopes.
// Defaults describe the first event of stream "order-1"; setters override one field at a time.

use crate::shared::core::primitives::EventEnvelope;
use serde_json::json;

pub struct EventEnvelopeBuilder {
    inner: EventEnvelope,
}

impl Default for EventEnvelopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl EventEnvelopeBuilder {
    pub fn new() -> Self {
        Self {
            inner: EventEnvelope {
                event_id: "ev-fixed-0001".to_string(),
                stream_id: "order-1".to_string(),
                stream_position: 1,
                event_type: "OrderPlaced".to_string(),
                payload: json!({ "sku": "sku-fixed-0001", "quantity": 1 }),
                timestamp: 1_700_000_000_000,
            },
        }
    }

    pub fn event_id(mut self, v: impl Into<String>) -> Self {
        self.inner.event_id = v.into();
        self
    }

    pub fn stream_id(mut self, v: impl Into<String>) -> Self {
        self.inner.stream_id = v.into();
        self
    }

    pub fn stream_position(mut self, v: u64) -> Self {
        self.inner.stream_position = v;
        self
    }

    pub fn event_type(mut self, v: impl Into<String>) -> Self {
        self.inner.event_type = v.into();
        self
    }

    pub fn payload(mut self, v: serde_json::Value) -> Self {
        self.inner.payload = v;
        self
    }

    pub fn timestamp(mut self, v: i64) -> Self {
        self.inner.timestamp = v;
        self
    }

    pub fn build(self) -> EventEnvelope {
        self.inner
    }
}

#[cfg(test)]
mod event_envelope_builder_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_delegates_to_new() {
        assert_eq!(
            EventEnvelopeBuilder::default().build(),
            EventEnvelopeBuilder::new().build()
        );
    }

    #[rstest]
    fn setters_override_all_fields_and_build_returns_inner() {
        let custom = EventEnvelopeBuilder::new()
            .event_id("ev-123")
            .stream_id("invoice-4")
            .stream_position(7)
            .event_type("InvoiceSent")
            .payload(json!({ "to": "a@b.c" }))
            .timestamp(42)
            .build();

        assert_eq!(custom.event_id, "ev-123");
        assert_eq!(custom.stream_id, "invoice-4");
        assert_eq!(custom.stream_position, 7);
        assert_eq!(custom.event_type, "InvoiceSent");
        assert_eq!(custom.payload, json!({ "to": "a@b.c" }));
        assert_eq!(custom.timestamp, 42);
    }
}
