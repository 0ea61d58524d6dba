//! Assembles the alert pipeline from its parts.
//!
//! ```text
//! SignalSource → NotificationListener → ThresholdAlertHandler
//!     → NotificationOrchestrator → BroadcastJobQueue → JobExecutor
//!     → BroadcastJobHandler → BroadcastTransport
//! ```

use tokio_util::sync::CancellationToken;
use tracing::info;

use stockwatch_alerts::{
    AlertError, BROADCAST_JOB_KIND, ItemCounter, NotificationOrchestrator, ThresholdAlertHandler,
};
use stockwatch_events::BroadcastTransport;

use crate::alerts::{BroadcastJobHandler, BroadcastJobQueue};
use crate::config::InventoryConfig;
use crate::jobs::{InMemoryJobStore, JobExecutor, JobExecutorConfig};
use crate::listener::{ListenerStats, NotificationListener, SignalSource};

pub struct AlertPipeline<C, T, S> {
    counter: C,
    transport: T,
    source: S,
    config: InventoryConfig,
    executor: JobExecutorConfig,
}

impl<C, T, S> AlertPipeline<C, T, S>
where
    C: ItemCounter + 'static,
    T: BroadcastTransport + 'static,
    S: SignalSource,
{
    pub fn new(counter: C, transport: T, source: S, config: InventoryConfig) -> Self {
        Self {
            counter,
            transport,
            source,
            config,
            executor: JobExecutorConfig::default().with_name("broadcast-jobs"),
        }
    }

    pub fn with_executor_config(mut self, executor: JobExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Run until `shutdown` is cancelled or the listener loses its source.
    /// The job executor is stopped either way, after in-flight attempts end.
    pub async fn run(self, shutdown: CancellationToken) -> Result<ListenerStats, AlertError> {
        let threshold = self.config.notification_threshold;
        let store = InMemoryJobStore::arc();

        let mut executor = JobExecutor::new(store.clone());
        executor.register_handler(
            BROADCAST_JOB_KIND,
            BroadcastJobHandler::new(self.transport, self.config.alert_route()),
        );
        let jobs = executor.spawn(self.executor, shutdown.child_token());

        let queue = BroadcastJobQueue::new(store, self.config.retry_policy());
        let orchestrator = NotificationOrchestrator::new(self.counter, queue);
        let handler = ThresholdAlertHandler::new(orchestrator, threshold);
        let listener = NotificationListener::new(self.source, handler, self.config.listener_config());

        info!(
            threshold,
            channel = %self.config.database.listen_channel,
            settings = ?self.config.notification_settings(),
            "alert pipeline started"
        );

        let result = listener.run(shutdown).await;

        jobs.shutdown().await;
        info!("alert pipeline stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{InMemoryItemRepository, ItemRepository, ThresholdHook};
    use crate::listener::signal_channel;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use stockwatch_core::ItemId;
    use stockwatch_events::InMemoryBroadcaster;
    use stockwatch_inventory::{Item, NewItem};

    fn fast_config(threshold: i64) -> InventoryConfig {
        let mut config = InventoryConfig::default();
        config.notification_threshold = threshold;
        config.database.check_interval_ms = 10;
        config.broadcasting.backoff_ms = 0;
        config
    }

    #[tokio::test]
    async fn signal_becomes_one_alert() {
        let (sender, source) = signal_channel();
        let repo = Arc::new(
            InMemoryItemRepository::new()
                .with_threshold_hook(ThresholdHook::new(2, "items_count_reached", sender.clone())),
        );
        let bus = Arc::new(InMemoryBroadcaster::new());
        let alerts = bus.subscribe();
        let shutdown = CancellationToken::new();

        let pipeline = AlertPipeline::new(repo.clone(), bus.clone(), source, fast_config(2))
            .with_executor_config(JobExecutorConfig::default().with_poll_interval(Duration::from_millis(5)));
        let task = tokio::spawn(pipeline.run(shutdown.clone()));

        for name in ["a", "b"] {
            let item = Item::create(ItemId::new(), NewItem::new(name, 1), Utc::now()).unwrap();
            repo.insert(&item).await.unwrap();
        }

        let message = tokio::task::spawn_blocking(move || alerts.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.event(), "item.count.exceeded");
        assert_eq!(message.payload()["current_count"], 2);
        assert_eq!(message.payload()["severity"], "warning");

        shutdown.cancel();
        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.received, 1);
        drop(sender);
    }

    #[tokio::test]
    async fn lost_source_stops_the_pipeline_with_an_error() {
        let (sender, source) = signal_channel();
        drop(sender);

        let pipeline = AlertPipeline::new(
            Arc::new(InMemoryItemRepository::new()),
            InMemoryBroadcaster::new(),
            source,
            fast_config(20),
        );

        let err = pipeline.run(CancellationToken::new()).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
