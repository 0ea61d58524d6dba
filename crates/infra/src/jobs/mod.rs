//! Background job system with retry, backoff and dead-lettering.
//!
//! - `Job`: kind + JSON payload + retry policy + attempt history
//! - `JobStore`: where jobs wait (in-memory)
//! - `JobExecutor`: worker pool running attempts with per-attempt timeouts
//! - Dead-letter list for jobs that exhausted their attempts

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{
    AttemptOutcome, ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobHandler,
};
pub use store::{DEFAULT_DEAD_LETTER_CAPACITY, InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{BackoffStrategy, DeadLetterEntry, Job, JobId, JobResult, JobStatus, RetryPolicy};
