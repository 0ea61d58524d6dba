//! Fan-out transport abstraction.
//!
//! Delivery is **at-least-once**: a producer that retries after a partial
//! failure may publish the same message twice, so subscribers must tolerate
//! duplicates. No ordering is guaranteed between independent publishers.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::BroadcastMessage;

/// Transport-level publish failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport connection error: {0}")]
    Connection(String),

    #[error("failed to serialize message: {0}")]
    Serialize(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// A subscription to the messages published on a transport.
///
/// Each subscription receives a copy of every message (broadcast semantics).
/// Designed for a single consuming thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Pub/sub transport accepting "publish message M to channel C".
///
/// Implementations must be shareable across tasks; publishing from several
/// job workers at once is the normal case.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), TransportError>;
}

#[async_trait]
impl<B> BroadcastTransport for Arc<B>
where
    B: BroadcastTransport + ?Sized,
{
    async fn publish(&self, message: BroadcastMessage) -> Result<(), TransportError> {
        (**self).publish(message).await
    }
}
