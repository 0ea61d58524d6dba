//! The alert event published to subscribers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use stockwatch_events::channels::ALERTS_CHANNEL;
use stockwatch_events::{BroadcastMessage, TransportError};

use crate::severity::Severity;

/// Default event name on the alerts channel.
pub const ALERT_EVENT_NAME: &str = "item.count.exceeded";

/// Fixed human-readable message carried by every alert.
pub const ALERT_MESSAGE: &str = "Item count exceeded the limit.";

/// Discriminator for client-side routing.
pub const ALERT_TYPE: &str = "count_exceeded_alert";

/// Where alerts are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRoute {
    pub channel: String,
    pub event_name: String,
}

impl AlertRoute {
    pub fn new(channel: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            event_name: event_name.into(),
        }
    }
}

impl Default for AlertRoute {
    fn default() -> Self {
        Self::new(ALERTS_CHANNEL, ALERT_EVENT_NAME)
    }
}

/// A threshold alert, stamped at publish time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub current_count: i64,
    pub threshold: i64,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Wire shape of the alert payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub message: String,
    pub current_count: i64,
    pub threshold: i64,
    pub severity: Severity,
    /// ISO-8601, UTC, microsecond precision.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl NotificationEvent {
    pub fn new(
        current_count: i64,
        threshold: i64,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            current_count,
            threshold,
            severity,
            timestamp,
        }
    }

    pub fn payload(&self) -> AlertPayload {
        AlertPayload {
            message: ALERT_MESSAGE.to_string(),
            current_count: self.current_count,
            threshold: self.threshold,
            severity: self.severity,
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            kind: ALERT_TYPE.to_string(),
        }
    }

    pub fn to_message(&self, route: &AlertRoute) -> Result<BroadcastMessage, TransportError> {
        let payload = serde_json::to_value(self.payload())
            .map_err(|e| TransportError::Serialize(e.to_string()))?;
        Ok(BroadcastMessage::new(
            route.channel.clone(),
            route.event_name.clone(),
            payload,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn message_matches_the_published_contract() {
        let at = Utc.with_ymd_and_hms(2025, 6, 29, 11, 21, 54).unwrap();
        let event = NotificationEvent::new(20, 20, Severity::Warning, at);

        let msg = event.to_message(&AlertRoute::default()).unwrap();

        assert_eq!(msg.channel(), "inventory-alerts");
        assert_eq!(msg.event(), "item.count.exceeded");
        assert_eq!(
            msg.payload(),
            &json!({
                "message": "Item count exceeded the limit.",
                "current_count": 20,
                "threshold": 20,
                "severity": "warning",
                "timestamp": "2025-06-29T11:21:54.000000Z",
                "type": "count_exceeded_alert",
            })
        );
    }

    #[test]
    fn custom_route_is_honoured() {
        let event = NotificationEvent::new(31, 20, Severity::Critical, Utc::now());
        let msg = event
            .to_message(&AlertRoute::new("ops-alerts", "stock.alert"))
            .unwrap();

        assert_eq!(msg.channel(), "ops-alerts");
        assert_eq!(msg.event(), "stock.alert");
        let payload: AlertPayload = serde_json::from_value(msg.into_payload()).unwrap();
        assert_eq!(payload.severity, Severity::Critical);
        assert_eq!(payload.kind, ALERT_TYPE);
    }
}
