//! Service configuration.
//!
//! Priority (highest to lowest):
//! 1. `DATABASE_URL` / `REDIS_URL`
//! 2. Environment variables prefixed `INVENTORY_` (`__` separates nesting,
//!    e.g. `INVENTORY_DATABASE__LISTEN_CHANNEL`)
//! 3. TOML file (`stockwatch.toml`, or the path in `STOCKWATCH_CONFIG`)
//! 4. Default values

use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockwatch_alerts::{AlertRoute, NotificationSettings, Severity};
use stockwatch_observability::LogConfig;

use crate::items::schema::validate_channel_name;
use crate::jobs::RetryPolicy;
use crate::listener::ListenerConfig;

pub const CONFIG_PATH_ENV: &str = "STOCKWATCH_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "stockwatch.toml";
pub const ENV_PREFIX: &str = "INVENTORY_";

/// Upper bound for the exponential backoff between broadcast attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Item count at which the trigger starts raising signals.
    pub notification_threshold: i64,
    pub database: DatabaseConfig,
    pub broadcasting: BroadcastingConfig,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// LISTEN/NOTIFY channel the trigger raises signals on.
    pub listen_channel: String,
    /// Longest single wait for a signal before re-checking for shutdown.
    pub check_interval_ms: u64,
    /// Install the count trigger at startup.
    pub install_trigger: bool,
    /// Size of the request-side pool. The listener holds its own connection.
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastingConfig {
    /// Fan-out channel for threshold alerts.
    pub channel: String,
    pub event_name: String,
    /// Fan-out channel for item create/update events.
    pub items_channel: String,
    /// Total attempts per broadcast job.
    pub retry_attempts: u32,
    /// Per-attempt timeout.
    pub timeout_seconds: u64,
    /// Base delay of the exponential backoff between attempts.
    pub backoff_ms: u64,
    pub redis_url: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            notification_threshold: 20,
            database: DatabaseConfig::default(),
            broadcasting: BroadcastingConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/inventory".to_string(),
            listen_channel: "items_count_reached".to_string(),
            check_interval_ms: 1000,
            install_trigger: true,
            max_connections: 5,
        }
    }
}

impl Default for BroadcastingConfig {
    fn default() -> Self {
        Self {
            channel: "inventory-alerts".to_string(),
            event_name: "item.count.exceeded".to_string(),
            items_channel: "inventory".to_string(),
            retry_attempts: 3,
            timeout_seconds: 30,
            backoff_ms: 500,
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl InventoryConfig {
    /// The layered provider chain, before extraction.
    pub fn figment() -> Figment {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        Figment::from(Serialized::defaults(InventoryConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
            .merge(Env::raw().only(&["REDIS_URL"]).map(|_| "broadcasting.redis_url".into()))
    }

    /// Load from all sources and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_threshold <= 0 {
            return Err(ConfigError::Invalid(format!(
                "notification_threshold must be greater than zero, got {}",
                self.notification_threshold
            )));
        }
        if self.broadcasting.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "broadcasting.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.broadcasting.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "broadcasting.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.database.check_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.check_interval_ms must be greater than zero".to_string(),
            ));
        }
        validate_channel_name(&self.database.listen_channel)
            .map_err(|e| ConfigError::Invalid(format!("database.listen_channel: {e}")))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.database.check_interval_ms)
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            channel: self.database.listen_channel.clone(),
            poll_interval: self.check_interval(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.broadcasting.retry_attempts,
            Duration::from_millis(self.broadcasting.backoff_ms),
            MAX_BACKOFF,
        )
        .with_attempt_timeout(Duration::from_secs(self.broadcasting.timeout_seconds))
    }

    pub fn alert_route(&self) -> AlertRoute {
        AlertRoute::new(&self.broadcasting.channel, &self.broadcasting.event_name)
    }

    pub fn notification_settings(&self) -> NotificationSettings {
        NotificationSettings {
            default_threshold: self.notification_threshold,
            severity_levels: Severity::ALL.to_vec(),
            retry_attempts: self.broadcasting.retry_attempts,
            timeout_seconds: self.broadcasting.timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use stockwatch_observability::LogFormat;

    #[test]
    fn defaults_are_valid() {
        let config = InventoryConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.notification_threshold, 20);
        assert_eq!(config.database.listen_channel, "items_count_reached");
        assert_eq!(config.check_interval(), Duration::from_secs(1));
        assert_eq!(config.alert_route(), AlertRoute::default());
        assert_eq!(config.notification_settings(), NotificationSettings::default());

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(30));
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn file_then_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "stockwatch.toml",
                r#"
                notification_threshold = 50

                [database]
                listen_channel = "stock_alerts"
                check_interval_ms = 250

                [logging]
                format = "pretty"
                "#,
            )?;
            jail.set_env("INVENTORY_NOTIFICATION_THRESHOLD", "75");
            jail.set_env("INVENTORY_BROADCASTING__RETRY_ATTEMPTS", "5");
            jail.set_env("REDIS_URL", "redis://cache:6379");

            let config = InventoryConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.notification_threshold, 75);
            assert_eq!(config.database.listen_channel, "stock_alerts");
            assert_eq!(config.database.check_interval_ms, 250);
            assert_eq!(config.broadcasting.retry_attempts, 5);
            assert_eq!(config.broadcasting.redis_url, "redis://cache:6379");
            assert_eq!(config.broadcasting.timeout_seconds, 30);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[test]
    fn database_url_env_maps_onto_database_url() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "postgres://db/stock");
            let config = InventoryConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.database.url, "postgres://db/stock");
            Ok(())
        });
    }

    #[test]
    fn config_path_can_be_overridden() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "notification_threshold = 7")?;
            jail.set_env(CONFIG_PATH_ENV, "custom.toml");
            let config = InventoryConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.notification_threshold, 7);
            Ok(())
        });
    }

    #[test]
    fn rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("INVENTORY_NOTIFICATION_THRESHOLD", "0");
            assert!(matches!(InventoryConfig::load(), Err(ConfigError::Invalid(_))));

            jail.set_env("INVENTORY_NOTIFICATION_THRESHOLD", "20");
            jail.set_env("INVENTORY_DATABASE__LISTEN_CHANNEL", "items-count");
            assert!(matches!(InventoryConfig::load(), Err(ConfigError::Invalid(_))));

            jail.set_env("INVENTORY_DATABASE__LISTEN_CHANNEL", "items_count_reached");
            jail.set_env("INVENTORY_BROADCASTING__TIMEOUT_SECONDS", "0");
            assert!(matches!(InventoryConfig::load(), Err(ConfigError::Invalid(_))));
            Ok(())
        });
    }

    #[test]
    fn malformed_values_fail_to_load() {
        Jail::expect_with(|jail| {
            jail.set_env("INVENTORY_NOTIFICATION_THRESHOLD", "lots");
            assert!(matches!(InventoryConfig::load(), Err(ConfigError::Load(_))));
            Ok(())
        });
    }

    #[test]
    fn zero_attempts_and_interval_are_rejected() {
        let mut config = InventoryConfig::default();
        config.broadcasting.retry_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = InventoryConfig::default();
        config.database.check_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
