use thiserror::Error;

/// A task definition whose schedule (or identity) cannot be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Task {task} defines both an interval and a crontab schedule")]
    BothSchedules { task: String },

    #[error("Task {task} has no schedule defined")]
    MissingSchedule { task: String },

    #[error("Interval must be at least one second, got {seconds}")]
    NonPositiveInterval { seconds: i64 },

    #[error("Invalid crontab expression '{expression}': expected 5 space-separated fields, got {found}")]
    CrontabArity { expression: String, found: usize },

    #[error("Invalid crontab {field} '{value}': {reason}")]
    InvalidCrontabField {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Task name must not be empty")]
    EmptyName,
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
