//! Broadcast job: publish one alert to the fan-out channel.
//!
//! The job carries the `(current_count, threshold, severity)` triple captured
//! at enqueue time and does not re-read the count when it runs. Retries,
//! backoff and per-attempt timeouts belong to the queue that executes it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use stockwatch_events::BroadcastTransport;

use crate::error::AlertError;
use crate::notification::{AlertRoute, NotificationEvent};
use crate::severity::Severity;

/// Job kind used to route queued broadcast jobs to their handler.
pub const BROADCAST_JOB_KIND: &str = "alerts.item_count_exceeded";

/// Immutable input of a broadcast attempt.
///
/// Re-running it publishes the same alert again (with a fresh timestamp);
/// subscribers must tolerate duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastJob {
    pub current_count: i64,
    pub threshold: i64,
    pub severity: Severity,
}

impl BroadcastJob {
    pub fn new(current_count: i64, threshold: i64, severity: Severity) -> Self {
        Self {
            current_count,
            threshold,
            severity,
        }
    }

    /// Execute one attempt. Any failure is reported as retryable.
    pub async fn run<T>(
        &self,
        transport: &T,
        route: &AlertRoute,
    ) -> Result<NotificationEvent, AlertError>
    where
        T: BroadcastTransport + ?Sized,
    {
        info!(
            current_count = self.current_count,
            threshold = self.threshold,
            severity = %self.severity,
            "broadcasting item count exceeded event"
        );

        let event = NotificationEvent::new(
            self.current_count,
            self.threshold,
            self.severity,
            Utc::now(),
        );

        let published = match event.to_message(route) {
            Ok(message) => transport.publish(message).await,
            Err(e) => Err(e),
        };

        match published {
            Ok(()) => {
                info!(channel = %route.channel, event = %route.event_name, "item count exceeded event broadcast");
                Ok(event)
            }
            Err(e) => {
                error!(
                    error = %e,
                    current_count = self.current_count,
                    threshold = self.threshold,
                    severity = %self.severity,
                    "failed to broadcast item count exceeded event"
                );
                Err(AlertError::TransientPublishFailure(e.to_string()))
            }
        }
    }

    /// Terminal failure hook, called once after the last attempt failed.
    /// The alert is dropped.
    pub fn failed(&self, error: &str, attempts: u32) {
        error!(
            error,
            attempts,
            current_count = self.current_count,
            threshold = self.threshold,
            severity = %self.severity,
            "broadcast job failed permanently"
        );
    }
}
