//! Postgres LISTEN/NOTIFY signal source.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::debug;

use stockwatch_alerts::{AlertError, ThresholdSignal};

use super::SignalSource;

/// Holds its own connection, separate from any pool checkouts, for as long
/// as it lives.
pub struct PgSignalSource {
    listener: PgListener,
}

impl PgSignalSource {
    pub async fn connect(database_url: &str) -> Result<Self, AlertError> {
        let listener = PgListener::connect(database_url)
            .await
            .map_err(|e| AlertError::disconnected(format!("failed to open listener connection: {e}")))?;
        Ok(Self { listener })
    }

    /// Open a dedicated connection using a pool's connect options.
    pub async fn connect_with(pool: &PgPool) -> Result<Self, AlertError> {
        let listener = PgListener::connect_with(pool)
            .await
            .map_err(|e| AlertError::disconnected(format!("failed to open listener connection: {e}")))?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl SignalSource for PgSignalSource {
    async fn listen(&mut self, channel: &str) -> Result<(), AlertError> {
        self.listener
            .listen(channel)
            .await
            .map_err(|e| AlertError::disconnected(format!("LISTEN {channel} failed: {e}")))?;
        debug!(channel, "LISTEN issued");
        Ok(())
    }

    async fn wait_for_next(&mut self, timeout: Duration) -> Result<Option<ThresholdSignal>, AlertError> {
        match tokio::time::timeout(timeout, self.listener.try_recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(Some(notification))) => Ok(Some(ThresholdSignal::new(
                notification.channel(),
                Some(notification.payload().to_string()),
            ))),
            Ok(Ok(None)) => Err(AlertError::disconnected("listener connection closed")),
            Ok(Err(e)) => Err(AlertError::disconnected(e.to_string())),
        }
    }
}
