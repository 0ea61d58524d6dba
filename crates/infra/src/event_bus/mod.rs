//! Infrastructure-backed broadcast transports.
//!
//! The transport contract lives in `stockwatch-events`; this module provides
//! the Redis implementation consumed by Echo-style websocket servers.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::RedisBroadcaster;
