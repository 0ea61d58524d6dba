//! Threshold signals and their handler contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AlertError;

/// A payload-light wake-up raised when the item count crosses the threshold.
///
/// The payload is informational only (a fixed string from the trigger).
/// Signals may be coalesced by the bus, so consumers re-derive the live count
/// instead of trusting anything carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSignal {
    channel: String,
    payload: Option<String>,
}

impl ThresholdSignal {
    pub fn new(channel: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.filter(|p| !p.is_empty()),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}

/// Invoked by the listener once per received signal.
///
/// Errors are logged by the listener and never stop it.
#[async_trait]
pub trait SignalHandler: Send + Sync {
    async fn on_signal(&self, signal: &ThresholdSignal) -> Result<(), AlertError>;
}

#[async_trait]
impl<H> SignalHandler for Arc<H>
where
    H: SignalHandler + ?Sized,
{
    async fn on_signal(&self, signal: &ThresholdSignal) -> Result<(), AlertError> {
        (**self).on_signal(signal).await
    }
}
