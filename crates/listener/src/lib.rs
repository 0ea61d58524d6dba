//! Inventory threshold listener process.
//!
//! Connects the Postgres trigger, the alert pipeline and the Redis fan-out,
//! and runs until asked to stop.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stockwatch_infra::InventoryConfig;
use stockwatch_infra::event_bus::RedisBroadcaster;
use stockwatch_infra::items::PostgresItemRepository;
use stockwatch_infra::listener::{ListenerStats, PgSignalSource};
use stockwatch_infra::pipeline::AlertPipeline;

/// Run the listener against Postgres and Redis until `shutdown` is cancelled.
///
/// Returns an error when startup fails or the listener loses its connection.
pub async fn run(config: InventoryConfig, shutdown: CancellationToken) -> anyhow::Result<ListenerStats> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("failed to connect to postgres")?;

    let repository = PostgresItemRepository::new(pool.clone());
    if config.database.install_trigger {
        repository
            .install_schema(config.notification_threshold, &config.database.listen_channel)
            .await
            .context("failed to install items count trigger")?;
    }

    // Dedicated connection; never taken from the pool.
    let source = PgSignalSource::connect(&config.database.url)
        .await
        .context("failed to open listener connection")?;

    let transport = RedisBroadcaster::connect(&config.broadcasting.redis_url)
        .await
        .context("failed to connect to redis")?;

    info!(
        threshold = config.notification_threshold,
        channel = %config.database.listen_channel,
        alerts_channel = %config.broadcasting.channel,
        "inventory listener starting"
    );

    let result = AlertPipeline::new(repository, transport, source, config)
        .run(shutdown)
        .await;

    pool.close().await;
    Ok(result?)
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
pub async fn cancel_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable; waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown requested");
    shutdown.cancel();
}
