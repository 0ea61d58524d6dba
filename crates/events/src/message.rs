use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single message headed for a fan-out channel.
///
/// Messages are constructed explicitly by their producers; there is no
/// implicit serialization of arbitrary objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    channel: String,
    event: String,
    payload: JsonValue,
}

impl BroadcastMessage {
    pub fn new(channel: impl Into<String>, event: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            channel: channel.into(),
            event: event.into(),
            payload,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Event name subscribers bind to (e.g. `item.count.exceeded`).
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn into_payload(self) -> JsonValue {
        self.payload
    }
}
