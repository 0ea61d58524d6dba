//! Redis pub/sub broadcast transport.
//!
//! Messages are published to the Redis channel named after the fan-out
//! channel, wrapped as `{"event": .., "data": .., "socket": null}`.
//! Pub/sub is not durable: subscribers that are offline miss messages.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use stockwatch_events::{BroadcastMessage, BroadcastTransport, TransportError};

/// Wrap a message in the envelope websocket relays expect.
pub fn envelope(message: &BroadcastMessage) -> JsonValue {
    json!({
        "event": message.event(),
        "data": message.payload(),
        "socket": JsonValue::Null,
    })
}

#[derive(Clone)]
pub struct RedisBroadcaster {
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroadcaster").finish_non_exhaustive()
    }
}

impl RedisBroadcaster {
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, TransportError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl BroadcastTransport for RedisBroadcaster {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), TransportError> {
        let body = serde_json::to_string(&envelope(&message))
            .map_err(|e| TransportError::Serialize(e.to_string()))?;

        let mut conn = self.connection.clone();
        let receivers: i64 = conn
            .publish(message.channel(), body)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        debug!(channel = message.channel(), event = message.event(), receivers, "published to redis");
        Ok(())
    }
}
