//! Fan-out broadcasting mechanics.
//!
//! The push-to-client transport is external; this crate only defines the
//! contract ("publish message M to channel C"), the message shape, an
//! in-memory implementation for tests/dev, and the channel catalogue with its
//! subscription authorization callback.

pub mod bus;
pub mod channels;
pub mod in_memory_bus;
pub mod message;

pub use bus::{BroadcastTransport, Subscription, TransportError};
pub use channels::{
    ADMIN_ALERTS_CHANNEL, ALERTS_CHANNEL, ChannelError, ITEM_CHANNEL_PREFIX, ITEMS_CHANNEL, Subscriber,
    authorize_subscription, item_channel,
};
pub use in_memory_bus::InMemoryBroadcaster;
pub use message::BroadcastMessage;
