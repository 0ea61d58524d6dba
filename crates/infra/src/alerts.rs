//! Job-queue adapters for the alert pipeline.
//!
//! `BroadcastJobQueue` turns `BroadcastJob`s into queued `Job`s, and
//! `BroadcastJobHandler` runs them against a broadcast transport.

use async_trait::async_trait;
use tracing::{debug, error};

use stockwatch_alerts::{AlertError, AlertQueue, AlertRoute, BROADCAST_JOB_KIND, BroadcastJob};
use stockwatch_events::BroadcastTransport;

use crate::jobs::{Job, JobHandler, JobResult, JobStore, RetryPolicy};

/// Enqueues broadcast jobs on a `JobStore` without waiting for them to run.
#[derive(Debug, Clone)]
pub struct BroadcastJobQueue<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: JobStore> BroadcastJobQueue<S> {
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: JobStore> AlertQueue for BroadcastJobQueue<S> {
    async fn enqueue(&self, job: BroadcastJob) -> Result<(), AlertError> {
        let payload = serde_json::to_value(job)
            .map_err(|e| AlertError::orchestration(format!("failed to encode broadcast job: {e}")))?;

        let queued = Job::new(BROADCAST_JOB_KIND, payload).with_retry_policy(self.policy.clone());
        let id = self
            .store
            .enqueue(queued)
            .map_err(|e| AlertError::orchestration(format!("failed to enqueue broadcast job: {e}")))?;

        debug!(job_id = %id, severity = %job.severity, "broadcast job enqueued");
        Ok(())
    }
}

/// Runs queued broadcast jobs.
#[derive(Debug, Clone)]
pub struct BroadcastJobHandler<T> {
    transport: T,
    route: AlertRoute,
}

impl<T: BroadcastTransport> BroadcastJobHandler<T> {
    pub fn new(transport: T, route: AlertRoute) -> Self {
        Self { transport, route }
    }
}

fn decode(job: &Job) -> Result<BroadcastJob, String> {
    serde_json::from_value(job.payload.clone())
        .map_err(|e| format!("invalid broadcast job payload: {e}"))
}

#[async_trait]
impl<T: BroadcastTransport> JobHandler for BroadcastJobHandler<T> {
    async fn handle(&self, job: &Job) -> JobResult {
        let broadcast = match decode(job) {
            Ok(b) => b,
            Err(e) => return JobResult::Failure(e),
        };

        match broadcast.run(&self.transport, &self.route).await {
            Ok(_) => JobResult::Success,
            Err(e) => JobResult::Failure(e.to_string()),
        }
    }

    async fn on_dead_letter(&self, job: &Job, error: &str) {
        match decode(job) {
            Ok(broadcast) => broadcast.failed(error, job.attempt),
            Err(e) => error!(job_id = %job.id, error = %e, "dead-lettered job has an unreadable payload"),
        }
    }
}
