//! Item-count alert pipeline: classification, orchestration and the
//! broadcast job.
//!
//! ```text
//! ThresholdSignal → NotificationOrchestrator ─ count ─→ ItemCounter
//!                           │ classify
//!                           └─ enqueue ─→ AlertQueue → BroadcastJob → BroadcastTransport
//! ```
//!
//! Every collaborator (counter, queue, transport) is injected; nothing here
//! reaches for global state or performs IO on its own.

pub mod error;
pub mod job;
pub mod notification;
pub mod orchestrator;
pub mod severity;
pub mod signal;

pub use error::AlertError;
pub use job::{BROADCAST_JOB_KIND, BroadcastJob};
pub use notification::{AlertPayload, AlertRoute, NotificationEvent};
pub use orchestrator::{
    AlertQueue, ItemCounter, NotificationOrchestrator, NotificationSettings,
    ThresholdAlertHandler, should_notify,
};
pub use severity::{Severity, classify};
pub use signal::{SignalHandler, ThresholdSignal};
