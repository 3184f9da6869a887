use chrono::{DateTime, Utc};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Environment prefix for overrides, e.g. `PERIODIC_DATABASE_PATH`.
pub const ENV_PREFIX: &str = "PERIODIC_";

/// Top-level config (periodic.toml + PERIODIC_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodicConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Task definitions declared in the config file rather than in code.
    #[serde(default)]
    pub tasks: Vec<TaskManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Controls the startup reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Run the reconciliation pass when `periodic-beat sync` starts (default: true).
    /// Override with env var: PERIODIC_SYNC_ON_STARTUP=false
    #[serde(default = "bool_true")]
    pub on_startup: bool,
    /// Create the schedule/task tables when they are missing (default: true).
    /// With `false` a missing schema makes the pass a silent no-op.
    #[serde(default = "bool_true")]
    pub migrate: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            on_startup: true,
            migrate: true,
        }
    }
}

/// One `[[tasks]]` entry. Mirrors the options accepted by the registration API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskManifest {
    /// Path the execution runtime uses to locate the job, e.g. `billing::send_invoices`.
    pub task: String,
    /// Unique task name; defaults to `task`.
    #[serde(default)]
    pub name: Option<String>,
    /// Run every N seconds.
    #[serde(default)]
    pub interval: Option<i64>,
    #[serde(default)]
    pub crontab: Option<CrontabManifest>,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub one_off: bool,
    /// RFC 3339 timestamp after which the task no longer runs.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    /// RFC 3339 timestamp of the first eligible run.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// Crontab given either as `"*/5 * * * *"` or as a table of named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrontabManifest {
    Expression(String),
    Fields {
        #[serde(default)]
        minute: Option<String>,
        #[serde(default)]
        hour: Option<String>,
        #[serde(default)]
        day_of_month: Option<String>,
        #[serde(default)]
        month_of_year: Option<String>,
        #[serde(default)]
        day_of_week: Option<String>,
    },
}

/// Map an env key (prefix already stripped) to a config path.
/// Only the first `_` separates section from field, so `sync_on_startup`
/// becomes `sync.on_startup`.
fn env_key_path(key: &str) -> String {
    key.to_ascii_lowercase().replacen('_', ".", 1)
}

fn bool_true() -> bool {
    true
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
}

fn default_db_path() -> String {
    format!("{}/.periodic/periodic.db", home_dir())
}

fn default_config_path() -> String {
    format!("{}/.periodic/periodic.toml", home_dir())
}

impl PeriodicConfig {
    /// Load config from a TOML file with PERIODIC_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.periodic/periodic.toml
    ///
    /// A missing file yields defaults; a file that fails to parse is an error.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).map(|key| env_key_path(key.as_str()).into()))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Parse config from an in-memory TOML document, without env overrides.
    pub fn from_toml(source: &str) -> Result<Self> {
        Figment::new()
            .merge(Toml::string(source))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PeriodicConfig::from_toml("").unwrap();
        assert!(config.sync.on_startup);
        assert!(config.sync.migrate);
        assert!(config.tasks.is_empty());
        assert!(config.database.path.ends_with(".periodic/periodic.db"));
    }

    #[test]
    fn parses_task_manifest() {
        let config = PeriodicConfig::from_toml(
            r#"
            [database]
            path = "/tmp/beat.db"

            [sync]
            migrate = false

            [[tasks]]
            task = "billing::send_invoices"
            interval = 60
            queue = "low"
            args = [1, "two"]

            [[tasks]]
            task = "reports::weekly"
            name = "weekly-report"
            enabled = false
            crontab = { minute = "0", hour = "3", day_of_week = "mon" }

            [[tasks]]
            task = "cleanup::purge"
            crontab = "*/5 * * * *"
            priority = 9
            kwargs = { dry_run = true }
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/tmp/beat.db");
        assert!(!config.sync.migrate);
        assert_eq!(config.tasks.len(), 3);

        let first = &config.tasks[0];
        assert_eq!(first.interval, Some(60));
        assert_eq!(first.queue.as_deref(), Some("low"));
        assert_eq!(first.args, vec![serde_json::json!(1), serde_json::json!("two")]);
        assert!(first.enabled);

        let second = &config.tasks[1];
        assert_eq!(second.name.as_deref(), Some("weekly-report"));
        assert!(!second.enabled);
        match second.crontab.as_ref().unwrap() {
            CrontabManifest::Fields {
                minute,
                hour,
                day_of_month,
                day_of_week,
                ..
            } => {
                assert_eq!(minute.as_deref(), Some("0"));
                assert_eq!(hour.as_deref(), Some("3"));
                assert_eq!(day_of_month, &None);
                assert_eq!(day_of_week.as_deref(), Some("mon"));
            }
            other => panic!("expected crontab fields, got {other:?}"),
        }

        let third = &config.tasks[2];
        assert_eq!(
            third.crontab,
            Some(CrontabManifest::Expression("*/5 * * * *".to_string()))
        );
        assert_eq!(third.priority, Some(9));
        assert_eq!(third.kwargs["dry_run"], serde_json::json!(true));
    }

    #[test]
    fn sync_section_reads_on_startup() {
        let config = PeriodicConfig::from_toml("[sync]\non_startup = false\n").unwrap();
        assert!(!config.sync.on_startup);
        assert!(config.sync.migrate);
    }

    #[test]
    fn unknown_sync_keys_are_rejected() {
        let err = PeriodicConfig::from_toml("[sync]\nstartup = false\n").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn env_keys_split_on_first_underscore() {
        assert_eq!(env_key_path("sync_on_startup"), "sync.on_startup");
        assert_eq!(env_key_path("database_path"), "database.path");
        assert_eq!(env_key_path("SYNC_MIGRATE"), "sync.migrate");
    }

    #[test]
    fn malformed_task_entry_fails_the_load() {
        let err = PeriodicConfig::from_toml("[[tasks]]\ntask = \"a::b\"\ninterval = \"60s\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn task_without_path_is_rejected() {
        let err = PeriodicConfig::from_toml("[[tasks]]\ninterval = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
