//! Alert pipeline error taxonomy.

use thiserror::Error;

/// Failures of the alert pipeline.
///
/// None of these are user-facing; they surface to operators through logs,
/// and `SignalChannelDisconnected` additionally through the process exit
/// status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertError {
    /// Threshold ≤ 0 handed to the classifier. Ends that orchestration cycle;
    /// never retried.
    #[error("invalid threshold {0}: threshold must be greater than zero")]
    InvalidThreshold(i64),

    /// The listener's dedicated connection is gone. Fatal to the listener.
    #[error("signal channel disconnected: {0}")]
    SignalChannelDisconnected(String),

    /// Publishing a broadcast failed; retried by the job queue.
    #[error("failed to publish broadcast: {0}")]
    TransientPublishFailure(String),

    /// Reading the live count or enqueuing the broadcast job failed.
    #[error("orchestration failed: {0}")]
    OrchestrationFailure(String),
}

impl AlertError {
    pub fn orchestration(msg: impl Into<String>) -> Self {
        Self::OrchestrationFailure(msg.into())
    }

    pub fn disconnected(msg: impl Into<String>) -> Self {
        Self::SignalChannelDisconnected(msg.into())
    }

    /// Whether the listener must stop and surface this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AlertError::SignalChannelDisconnected(_))
    }
}
