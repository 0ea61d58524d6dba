//! Long-running consumer of threshold signals.
//!
//! The listener owns a dedicated signal source (for Postgres, its own
//! connection outside the pool), waits for signals in bounded intervals and
//! hands each one to a `SignalHandler`. Handler failures are logged and the
//! loop keeps going; only losing the source ends it with an error.

pub mod in_memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stockwatch_alerts::{AlertError, SignalHandler, ThresholdSignal};

pub use in_memory::{InMemorySignalSource, SignalSender, signal_channel};
pub use postgres::PgSignalSource;

/// Where threshold signals come from.
#[async_trait]
pub trait SignalSource: Send {
    /// Subscribe to a named channel.
    async fn listen(&mut self, channel: &str) -> Result<(), AlertError>;

    /// Wait up to `timeout` for the next signal.
    ///
    /// `Ok(None)` means nothing arrived in time. A lost source is reported
    /// as `AlertError::SignalChannelDisconnected`.
    async fn wait_for_next(&mut self, timeout: Duration) -> Result<Option<ThresholdSignal>, AlertError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub channel: String,
    /// Upper bound on a single wait; also bounds shutdown latency.
    pub poll_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            channel: "items_count_reached".to_string(),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

/// Counters reported when the listener stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListenerStats {
    pub received: u64,
    pub handled: u64,
    pub failed: u64,
}

pub struct NotificationListener<S, H> {
    source: S,
    handler: H,
    config: ListenerConfig,
}

impl<S, H> NotificationListener<S, H>
where
    S: SignalSource,
    H: SignalHandler,
{
    pub fn new(source: S, handler: H, config: ListenerConfig) -> Self {
        Self {
            source,
            handler,
            config,
        }
    }

    /// Listen until `shutdown` is cancelled or the source is lost.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<ListenerStats, AlertError> {
        let channel = self.config.channel.clone();

        self.source.listen(&channel).await?;
        info!(channel = %channel, "listening for item count threshold signals");

        let mut stats = ListenerStats::default();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.source.wait_for_next(self.config.poll_interval).await {
                Ok(Some(signal)) => {
                    stats.received += 1;
                    info!(channel = signal.channel(), payload = ?signal.payload(), "threshold signal received");

                    match self.handler.on_signal(&signal).await {
                        Ok(()) => {
                            stats.handled += 1;
                            info!(channel = %channel, "threshold signal dispatched");
                        }
                        Err(err) => {
                            stats.failed += 1;
                            error!(channel = %channel, error = %err, "threshold signal handler failed");
                        }
                    }
                }
                Ok(None) => continue,
                Err(err) => {
                    error!(channel = %channel, error = %err, "lost threshold signal source");
                    return Err(err);
                }
            }
        }

        info!(
            channel = %channel,
            received = stats.received,
            handled = stats.handled,
            failed = stats.failed,
            "notification listener stopped"
        );
        Ok(stats)
    }
}
