//! Signal → read count → classify → enqueue.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use crate::error::AlertError;
use crate::job::BroadcastJob;
use crate::severity::{Severity, classify};
use crate::signal::{SignalHandler, ThresholdSignal};

/// Authoritative live item count (a plain, unlocked count query).
#[async_trait]
pub trait ItemCounter: Send + Sync {
    async fn count_items(&self) -> Result<i64, AlertError>;
}

/// Non-blocking hand-off of broadcast jobs to the worker pool.
#[async_trait]
pub trait AlertQueue: Send + Sync {
    async fn enqueue(&self, job: BroadcastJob) -> Result<(), AlertError>;
}

#[async_trait]
impl<C> ItemCounter for Arc<C>
where
    C: ItemCounter + ?Sized,
{
    async fn count_items(&self) -> Result<i64, AlertError> {
        (**self).count_items().await
    }
}

#[async_trait]
impl<Q> AlertQueue for Arc<Q>
where
    Q: AlertQueue + ?Sized,
{
    async fn enqueue(&self, job: BroadcastJob) -> Result<(), AlertError> {
        (**self).enqueue(job).await
    }
}

/// Only notify once the count meets or exceeds the threshold.
pub fn should_notify(current_count: i64, threshold: i64) -> bool {
    current_count >= threshold
}

/// Snapshot of the effective notification settings, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSettings {
    pub default_threshold: i64,
    pub severity_levels: Vec<Severity>,
    pub retry_attempts: u32,
    pub timeout_seconds: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            default_threshold: 20,
            severity_levels: Severity::ALL.to_vec(),
            retry_attempts: 3,
            timeout_seconds: 30,
        }
    }
}

/// Stateless between calls: every invocation is an independent
/// read-classify-enqueue cycle. No debouncing, no coalescing.
#[derive(Debug, Clone)]
pub struct NotificationOrchestrator<C, Q> {
    counter: C,
    queue: Q,
}

impl<C, Q> NotificationOrchestrator<C, Q>
where
    C: ItemCounter,
    Q: AlertQueue,
{
    pub fn new(counter: C, queue: Q) -> Self {
        Self { counter, queue }
    }

    /// Handle one threshold crossing. Failures are logged here and returned
    /// to the caller.
    pub async fn handle_threshold_reached(&self, threshold: i64) -> Result<BroadcastJob, AlertError> {
        match self.process(threshold).await {
            Ok(job) => Ok(job),
            Err(err) => {
                error!(error = %err, threshold, "failed to handle inventory count threshold notification");
                Err(err)
            }
        }
    }

    async fn process(&self, threshold: i64) -> Result<BroadcastJob, AlertError> {
        let current_count = self.counter.count_items().await?;

        info!(current_count, threshold, "processing inventory count threshold notification");

        let severity = classify(current_count, threshold)?;
        let job = BroadcastJob::new(current_count, threshold, severity);
        self.queue.enqueue(job).await?;

        info!(
            current_count,
            threshold,
            severity = %severity,
            "inventory notification dispatched"
        );

        Ok(job)
    }
}

/// Binds an orchestrator to the configured threshold so the listener can
/// drive it.
#[derive(Debug, Clone)]
pub struct ThresholdAlertHandler<C, Q> {
    orchestrator: NotificationOrchestrator<C, Q>,
    threshold: i64,
}

impl<C, Q> ThresholdAlertHandler<C, Q>
where
    C: ItemCounter,
    Q: AlertQueue,
{
    pub fn new(orchestrator: NotificationOrchestrator<C, Q>, threshold: i64) -> Self {
        Self {
            orchestrator,
            threshold,
        }
    }
}

#[async_trait]
impl<C, Q> SignalHandler for ThresholdAlertHandler<C, Q>
where
    C: ItemCounter,
    Q: AlertQueue,
{
    async fn on_signal(&self, _signal: &ThresholdSignal) -> Result<(), AlertError> {
        info!(threshold = self.threshold, "items count threshold reached, processing notification");
        self.orchestrator
            .handle_threshold_reached(self.threshold)
            .await
            .map(|_| ())
    }
}
