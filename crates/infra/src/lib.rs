//! Infrastructure layer: Postgres, Redis, config, job queue and the
//! long-running alert listener.

pub mod alerts;
pub mod config;
pub mod event_bus;
pub mod items;
pub mod jobs;
pub mod listener;
pub mod pipeline;

pub use config::{BroadcastingConfig, ConfigError, DatabaseConfig, InventoryConfig};
pub use pipeline::AlertPipeline;
