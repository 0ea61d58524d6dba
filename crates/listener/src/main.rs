use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stockwatch_infra::InventoryConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match InventoryConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from this file, so it is not up yet.
            eprintln!("stockwatch-listener: {e}");
            return ExitCode::FAILURE;
        }
    };

    stockwatch_observability::init_with(&config.logging);

    let shutdown = CancellationToken::new();
    tokio::spawn(stockwatch_listener::cancel_on_signal(shutdown.clone()));

    match stockwatch_listener::run(config, shutdown).await {
        Ok(stats) => {
            info!(
                received = stats.received,
                handled = stats.handled,
                failed = stats.failed,
                "inventory listener exited"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format_args!("{e:#}"), "inventory listener failed");
            ExitCode::FAILURE
        }
    }
}
