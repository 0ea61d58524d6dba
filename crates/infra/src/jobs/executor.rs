//! Job executor with retry, backoff and per-attempt timeouts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobId, JobResult, JobStatus};

/// Executes jobs of one kind.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run one attempt. Bounded by the job's `attempt_timeout`.
    async fn handle(&self, job: &Job) -> JobResult;

    /// Called exactly once when the job has exhausted its attempts.
    async fn on_dead_letter(&self, _job: &Job, _error: &str) {}
}

#[async_trait]
impl<H> JobHandler for Arc<H>
where
    H: JobHandler + ?Sized,
{
    async fn handle(&self, job: &Job) -> JobResult {
        (**self).handle(job).await
    }

    async fn on_dead_letter(&self, job: &Job, error: &str) {
        (**self).on_dead_letter(job, error).await
    }
}

/// Upper bound on `max_concurrent`. Shutdown reclaims every slot in a single
/// `acquire_many`, which takes a `u32`.
pub const MAX_CONCURRENT: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// How often to poll for ready jobs when idle
    pub poll_interval: Duration,
    /// Maximum concurrently running attempts
    pub max_concurrent: usize,
    /// Name for logging
    pub name: String,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_concurrent: 4,
            name: "job-executor".to_string(),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Clamped to `1..=MAX_CONCURRENT`.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.clamp(1, MAX_CONCURRENT);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExecutorStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_dead_lettered: u64,
    pub current_running: usize,
}

/// What happened to a job after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Retrying { error: String },
    DeadLettered { error: String },
}

/// Handle to a spawned executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: CancellationToken,
    join: Option<JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Stop claiming new jobs and wait for in-flight attempts to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!(error = %e, "job executor task panicked");
            }
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Background job executor.
///
/// Claims ready jobs from a store, runs them through the handler registered
/// for their kind, and records retries and dead-lettering.
pub struct JobExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
            stats: Arc::new(Mutex::new(ExecutorStats::default())),
        }
    }

    /// Register a handler for a job kind. `"prefix.*"` matches a category and
    /// `"*"` matches everything.
    pub fn register_handler<H>(&mut self, kind_pattern: impl Into<String>, handler: H)
    where
        H: JobHandler + 'static,
    {
        self.handlers.insert(kind_pattern.into(), Arc::new(handler));
    }

    fn get_handler(&self, kind: &str) -> Option<Arc<dyn JobHandler>> {
        if let Some(h) = self.handlers.get(kind) {
            return Some(h.clone());
        }

        let category = self.handlers.iter().find_map(|(pattern, handler)| {
            pattern
                .strip_suffix(".*")
                .filter(|prefix| kind.starts_with(prefix))
                .map(|_| handler.clone())
        });

        category.or_else(|| self.handlers.get("*").cloned())
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut ExecutorStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        }
    }

    /// Claim and run a single ready job, if any.
    pub async fn run_once(&self) -> Result<Option<(JobId, AttemptOutcome)>, JobStoreError> {
        match self.store.claim_next()? {
            Some(job) => self.execute(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Run ready jobs until none is left. Returns the number of attempts made.
    pub async fn run_until_idle(&self) -> Result<usize, JobStoreError> {
        let mut attempts = 0;
        while self.run_once().await?.is_some() {
            attempts += 1;
        }
        Ok(attempts)
    }

    async fn execute(&self, mut job: Job) -> Result<(JobId, AttemptOutcome), JobStoreError> {
        let started = Utc::now();
        let handler = self.get_handler(&job.kind);

        self.record(|s| s.current_running += 1);

        let result = match &handler {
            None => JobResult::Failure(format!("no handler for job kind: {}", job.kind)),
            Some(handler) => {
                let limit = job.retry_policy.attempt_timeout;
                match tokio::time::timeout(limit, handler.handle(&job)).await {
                    Ok(result) => result,
                    Err(_) => JobResult::Failure(format!(
                        "attempt timed out after {}ms",
                        limit.as_millis()
                    )),
                }
            }
        };

        self.record(|s| {
            s.current_running = s.current_running.saturating_sub(1);
            s.jobs_processed += 1;
        });

        let outcome = match result {
            JobResult::Success => {
                job.mark_completed(started);
                self.store.update(&job)?;
                self.record(|s| s.jobs_succeeded += 1);
                debug!(job_id = %job.id, kind = %job.kind, attempt = job.attempt, "job completed");
                AttemptOutcome::Succeeded
            }
            JobResult::Failure(error) => {
                job.mark_failed(error.clone(), started);
                self.store.update(&job)?;
                self.record(|s| s.jobs_failed += 1);

                if matches!(job.status, JobStatus::DeadLettered { .. }) {
                    warn!(
                        job_id = %job.id,
                        kind = %job.kind,
                        attempts = job.attempt,
                        error = %error,
                        "job dead-lettered"
                    );
                    self.store.dead_letter(job.clone(), error.clone())?;
                    self.record(|s| s.jobs_dead_lettered += 1);
                    if let Some(handler) = &handler {
                        handler.on_dead_letter(&job, &error).await;
                    }
                    AttemptOutcome::DeadLettered { error }
                } else {
                    debug!(
                        job_id = %job.id,
                        kind = %job.kind,
                        attempt = job.attempt,
                        error = %error,
                        retry_at = ?job.scheduled_at,
                        "job attempt failed; retry scheduled"
                    );
                    AttemptOutcome::Retrying { error }
                }
            }
        };

        Ok((job.id, outcome))
    }

    /// Run the executor as a background task until `shutdown` is cancelled.
    pub fn spawn(self, config: JobExecutorConfig, shutdown: CancellationToken) -> JobExecutorHandle {
        let stats = self.stats.clone();
        let join = tokio::spawn(executor_loop(Arc::new(self), config, shutdown.clone()));

        JobExecutorHandle {
            shutdown,
            join: Some(join),
            stats,
        }
    }
}

async fn executor_loop<S: JobStore + 'static>(
    executor: Arc<JobExecutor<S>>,
    config: JobExecutorConfig,
    shutdown: CancellationToken,
) {
    info!(executor = %config.name, max_concurrent = config.max_concurrent, "job executor started");

    let slots = config.max_concurrent.clamp(1, MAX_CONCURRENT);
    let semaphore = Arc::new(Semaphore::new(slots));

    loop {
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        match executor.store.claim_next() {
            Ok(Some(job)) => {
                debug!(
                    executor = %config.name,
                    job_id = %job.id,
                    kind = %job.kind,
                    attempt = job.attempt,
                    "claimed job"
                );

                let executor = executor.clone();
                let name = config.name.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = executor.execute(job).await {
                        error!(executor = %name, error = %e, "failed to record job outcome");
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                idle(&shutdown, config.poll_interval).await;
            }
            Err(e) => {
                drop(permit);
                error!(executor = %config.name, error = %e, "failed to claim job");
                idle(&shutdown, config.poll_interval).await;
            }
        }
    }

    // In-flight attempts hold permits; wait for all of them.
    let _ = semaphore
        .acquire_many(u32::try_from(slots).unwrap_or(u32::MAX))
        .await;

    info!(executor = %config.name, "job executor stopped");
}

async fn idle(shutdown: &CancellationToken, interval: Duration) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(interval) => {}
    }
}
