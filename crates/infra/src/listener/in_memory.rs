//! In-process signal channel, standing in for LISTEN/NOTIFY in tests and
//! in-memory deployments.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use stockwatch_alerts::{AlertError, ThresholdSignal};

use super::SignalSource;

/// Create a connected sender/source pair.
pub fn signal_channel() -> (SignalSender, InMemorySignalSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        SignalSender { tx },
        InMemorySignalSource {
            rx,
            channels: Vec::new(),
        },
    )
}

/// Raising side. Cloneable; the source reports a disconnect once every
/// sender is dropped.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<ThresholdSignal>,
}

impl SignalSender {
    /// Returns `false` when the source is gone.
    pub fn notify(&self, channel: &str, payload: impl Into<String>) -> bool {
        self.tx
            .send(ThresholdSignal::new(channel, Some(payload.into())))
            .is_ok()
    }
}

#[derive(Debug)]
pub struct InMemorySignalSource {
    rx: mpsc::UnboundedReceiver<ThresholdSignal>,
    channels: Vec<String>,
}

#[async_trait]
impl SignalSource for InMemorySignalSource {
    async fn listen(&mut self, channel: &str) -> Result<(), AlertError> {
        if !self.channels.iter().any(|c| c == channel) {
            self.channels.push(channel.to_string());
        }
        Ok(())
    }

    async fn wait_for_next(&mut self, timeout: Duration) -> Result<Option<ThresholdSignal>, AlertError> {
        let deadline = Instant::now() + timeout;

        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(AlertError::disconnected("all signal senders dropped")),
                Ok(Some(signal)) => {
                    if self.channels.iter().any(|c| c == signal.channel()) {
                        return Ok(Some(signal));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_only_listened_channels() {
        let (sender, mut source) = signal_channel();
        source.listen("items_count_reached").await.unwrap();

        sender.notify("other", "ignored");
        sender.notify("items_count_reached", "Items count has reached 20");

        let signal = source
            .wait_for_next(Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(signal.channel(), "items_count_reached");
        assert_eq!(signal.payload(), Some("Items count has reached 20"));
    }

    #[tokio::test]
    async fn times_out_with_none() {
        let (_sender, mut source) = signal_channel();
        source.listen("items_count_reached").await.unwrap();

        let next = source.wait_for_next(Duration::from_millis(10)).await.unwrap();
        assert!(next.is_none());
    }
}
