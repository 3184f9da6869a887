//! `periodic-core`: configuration and constants shared by the periodic task
//! crates and the `periodic-beat` binary.

pub mod config;
pub mod error;

pub use config::{CrontabManifest, DatabaseConfig, PeriodicConfig, SyncConfig, TaskManifest};
pub use error::{ConfigError, Result};
