//! Job storage.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::types::{DeadLetterEntry, Job, JobId, JobStatus};

/// Job store abstraction.
pub trait JobStore: Send + Sync {
    /// Enqueue a new job. Never blocks on job execution.
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the oldest ready job (pending, or failed with its backoff
    /// elapsed) and mark it running.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError>;

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError>;

    fn stats(&self) -> Result<JobStats, JobStoreError>;
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next()
    }

    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError> {
        (**self).dead_letter(job, reason)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        (**self).list_dead_letters(limit)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job counts by status. `completed` and `dead_lettered` are totals since
/// the store was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// Dead-letter entries kept by default before the oldest are dropped.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 100;

/// In-memory job store.
///
/// Only pending, running and retrying jobs are held. A job is removed as
/// soon as an update marks it completed or dead-lettered; the dead-letter
/// list is a bounded ring of the most recent entries. Jobs that have not run
/// when the process stops are lost.
#[derive(Debug)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    dead_letters: RwLock<VecDeque<DeadLetterEntry>>,
    dead_letter_capacity: usize,
    completed: AtomicUsize,
    dead_lettered: AtomicUsize,
}

fn poisoned() -> JobStoreError {
    JobStoreError::Storage("job store lock poisoned".to_string())
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::with_dead_letter_capacity(DEFAULT_DEAD_LETTER_CAPACITY)
    }
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_dead_letter_capacity(capacity: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            dead_letters: RwLock::new(VecDeque::new()),
            dead_letter_capacity: capacity,
            completed: AtomicUsize::new(0),
            dead_lettered: AtomicUsize::new(0),
        }
    }

    /// Number of jobs still held (pending, running or awaiting a retry).
    pub fn retained_jobs(&self) -> Result<usize, JobStoreError> {
        Ok(self.jobs()?.len())
    }

    fn jobs(&self) -> Result<RwLockReadGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs.read().map_err(|_| poisoned())
    }

    fn jobs_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<JobId, Job>>, JobStoreError> {
        self.jobs.write().map_err(|_| poisoned())
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs_mut()?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    /// Finished jobs are no longer held and come back as `None`.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        Ok(self.jobs()?.get(&job_id).cloned())
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs_mut()?;
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }

        match job.status {
            JobStatus::Completed => {
                jobs.remove(&job.id);
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            JobStatus::DeadLettered { .. } => {
                jobs.remove(&job.id);
                self.dead_lettered.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                jobs.insert(job.id, job.clone());
            }
        }
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.jobs_mut()?;

        // Oldest ready job first.
        let next = jobs
            .values()
            .filter(|j| {
                matches!(j.status, JobStatus::Pending | JobStatus::Failed { .. }) && j.is_ready()
            })
            .min_by_key(|j| (j.created_at, j.id.0))
            .map(|j| j.id);

        Ok(next.and_then(|id| {
            jobs.get_mut(&id).map(|job| {
                job.mark_running();
                job.clone()
            })
        }))
    }

    fn dead_letter(&self, job: Job, reason: String) -> Result<(), JobStoreError> {
        let mut dead = self.dead_letters.write().map_err(|_| poisoned())?;
        dead.push_back(DeadLetterEntry::new(job, reason));
        while dead.len() > self.dead_letter_capacity {
            dead.pop_front();
        }
        Ok(())
    }

    /// Oldest first.
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, JobStoreError> {
        let dead = self.dead_letters.read().map_err(|_| poisoned())?;
        Ok(dead.iter().take(limit).cloned().collect())
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.jobs()?;
        let mut stats = JobStats {
            completed: self.completed.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            ..JobStats::default()
        };

        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Failed { .. } => stats.failed += 1,
                JobStatus::Completed | JobStatus::DeadLettered { .. } => {}
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::RetryPolicy;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn claims_in_fifo_order_and_marks_running() {
        let store = InMemoryJobStore::new();
        let first = store.enqueue(Job::new("a", serde_json::json!(1))).unwrap();
        let second = store.enqueue(Job::new("a", serde_json::json!(2))).unwrap();

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, first);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempt, 1);

        assert_eq!(store.claim_next().unwrap().unwrap().id, second);
        assert!(store.claim_next().unwrap().is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let store = InMemoryJobStore::new();
        let job = Job::new("a", serde_json::json!({}));
        store.enqueue(job.clone()).unwrap();
        assert!(matches!(
            store.enqueue(job),
            Err(JobStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn failed_job_waits_for_its_backoff() {
        let store = InMemoryJobStore::new();
        let job = Job::new("a", serde_json::json!({}))
            .with_retry_policy(RetryPolicy::fixed(3, Duration::from_secs(60)));
        store.enqueue(job).unwrap();

        let mut claimed = store.claim_next().unwrap().unwrap();
        claimed.mark_failed("boom".into(), Utc::now());
        store.update(&claimed).unwrap();

        assert!(store.claim_next().unwrap().is_none());
        assert_eq!(store.stats().unwrap().failed, 1);
    }

    #[test]
    fn finished_jobs_are_released() {
        let store = InMemoryJobStore::new();

        for i in 0..1000 {
            store.enqueue(Job::new("a", serde_json::json!(i))).unwrap();
            let mut job = store.claim_next().unwrap().unwrap();
            job.mark_completed(Utc::now());
            store.update(&job).unwrap();
            assert!(store.get(job.id).unwrap().is_none());
        }

        assert_eq!(store.retained_jobs().unwrap(), 0);
        assert_eq!(
            store.stats().unwrap(),
            JobStats {
                completed: 1000,
                ..JobStats::default()
            }
        );
    }

    #[test]
    fn dead_letters_keep_only_the_most_recent() {
        let store = InMemoryJobStore::with_dead_letter_capacity(2);

        for i in 0..5 {
            let mut job =
                Job::new("a", serde_json::json!(i)).with_retry_policy(RetryPolicy::no_retry());
            store.enqueue(job.clone()).unwrap();
            job.mark_running();
            job.mark_failed(format!("error {i}"), Utc::now());
            store.update(&job).unwrap();
            store.dead_letter(job, format!("error {i}")).unwrap();
        }

        let reasons: Vec<_> = store
            .list_dead_letters(10)
            .unwrap()
            .into_iter()
            .map(|e| e.reason)
            .collect();
        assert_eq!(reasons, ["error 3", "error 4"]);
        assert_eq!(store.retained_jobs().unwrap(), 0);
        assert_eq!(store.stats().unwrap().dead_lettered, 5);
    }

    #[test]
    fn update_of_unknown_job_fails() {
        let store = InMemoryJobStore::new();
        let job = Job::new("a", serde_json::json!({}));
        assert!(matches!(store.update(&job), Err(JobStoreError::NotFound(_))));
    }
}
