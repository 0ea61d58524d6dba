//! In-memory broadcaster for tests/dev.

use std::sync::{Mutex, mpsc};

use async_trait::async_trait;

use crate::bus::{BroadcastTransport, Subscription, TransportError};
use crate::message::BroadcastMessage;

/// In-memory fan-out transport.
///
/// - No IO
/// - Best-effort fan-out to every live subscriber, regardless of channel
/// - Subscribers filter on `BroadcastMessage::channel` themselves
#[derive(Debug, Default)]
pub struct InMemoryBroadcaster {
    subscribers: Mutex<Vec<mpsc::Sender<BroadcastMessage>>>,
}

impl InMemoryBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription<BroadcastMessage> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still hands back a subscription; it simply never
        // receives anything.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[async_trait]
impl BroadcastTransport for InMemoryBroadcaster {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), TransportError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| TransportError::Rejected("subscriber list poisoned".to_string()))?;

        // Drop dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let bus = InMemoryBroadcaster::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(BroadcastMessage::new("inventory", "item.updated", json!({"id": 1})))
            .await
            .unwrap();

        assert_eq!(a.drain().len(), 1);
        let got = b.drain();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].channel(), "inventory");
        assert_eq!(got[0].payload()["id"], 1);
    }

    #[tokio::test]
    async fn dropped_subscribers_do_not_fail_publish() {
        let bus = InMemoryBroadcaster::new();
        drop(bus.subscribe());
        let live = bus.subscribe();

        bus.publish(BroadcastMessage::new("inventory", "x", json!(null)))
            .await
            .unwrap();

        assert_eq!(live.drain().len(), 1);
    }
}
