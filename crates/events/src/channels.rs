//! Channel catalogue and subscription authorization.
//!
//! - No IO
//! - No panics
//! - Pure policy check, invoked by whatever transport authenticates sockets

use thiserror::Error;

/// Raw item-changed payloads for every create/update.
pub const ITEMS_CHANNEL: &str = "inventory";

/// Threshold alerts (`item.count.exceeded`).
pub const ALERTS_CHANNEL: &str = "inventory-alerts";

/// Admin-only alerts.
pub const ADMIN_ALERTS_CHANNEL: &str = "inventory-admin-alerts";

/// Per-item updates: `inventory.item.{item_id}`.
pub const ITEM_CHANNEL_PREFIX: &str = "inventory.item.";

/// Who is asking to subscribe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subscriber {
    pub authenticated: bool,
    pub admin: bool,
}

impl Subscriber {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user() -> Self {
        Self {
            authenticated: true,
            admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            authenticated: true,
            admin: true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("forbidden: channel '{0}' requires an admin subscriber")]
    Forbidden(String),
}

/// Per-item channel name.
pub fn item_channel(item_id: impl core::fmt::Display) -> String {
    format!("{ITEM_CHANNEL_PREFIX}{item_id}")
}

/// Decide whether `subscriber` may listen on `channel`.
pub fn authorize_subscription(channel: &str, subscriber: &Subscriber) -> Result<(), ChannelError> {
    match channel {
        ITEMS_CHANNEL | ALERTS_CHANNEL => Ok(()),
        ADMIN_ALERTS_CHANNEL => {
            if subscriber.authenticated && subscriber.admin {
                Ok(())
            } else {
                Err(ChannelError::Forbidden(channel.to_string()))
            }
        }
        _ => match channel.strip_prefix(ITEM_CHANNEL_PREFIX) {
            Some(item_id) if !item_id.is_empty() => Ok(()),
            _ => Err(ChannelError::UnknownChannel(channel.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_channels_are_open_to_anyone() {
        let anon = Subscriber::anonymous();
        assert!(authorize_subscription(ITEMS_CHANNEL, &anon).is_ok());
        assert!(authorize_subscription(ALERTS_CHANNEL, &anon).is_ok());
        assert!(authorize_subscription(&item_channel("42"), &anon).is_ok());
    }

    #[test]
    fn admin_alerts_require_admin() {
        assert_eq!(
            authorize_subscription(ADMIN_ALERTS_CHANNEL, &Subscriber::user()),
            Err(ChannelError::Forbidden(ADMIN_ALERTS_CHANNEL.to_string()))
        );
        assert!(authorize_subscription(ADMIN_ALERTS_CHANNEL, &Subscriber::admin()).is_ok());
    }

    #[test]
    fn unknown_channels_are_rejected() {
        let anon = Subscriber::anonymous();
        assert!(matches!(
            authorize_subscription("payroll", &anon),
            Err(ChannelError::UnknownChannel(_))
        ));
        assert!(matches!(
            authorize_subscription(ITEM_CHANNEL_PREFIX, &anon),
            Err(ChannelError::UnknownChannel(_))
        ));
    }
}
