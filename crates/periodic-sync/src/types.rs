use std::fmt;

use chrono::{DateTime, Utc};

/// Stored in `periodic_tasks.description` to mark rows this engine owns.
/// Rows carrying any other description are never modified or deleted.
pub const MANAGED_DESCRIPTION: &str = "Managed by periodic-sync";

/// Unit stored alongside interval schedules.
pub const INTERVAL_PERIOD: &str = "seconds";

/// Handle to a persisted schedule row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleRef {
    Interval(i64),
    Crontab(i64),
}

impl ScheduleRef {
    pub fn interval_id(self) -> Option<i64> {
        match self {
            ScheduleRef::Interval(id) => Some(id),
            ScheduleRef::Crontab(_) => None,
        }
    }

    pub fn crontab_id(self) -> Option<i64> {
        match self {
            ScheduleRef::Crontab(id) => Some(id),
            ScheduleRef::Interval(_) => None,
        }
    }
}

impl fmt::Display for ScheduleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleRef::Interval(id) => write!(f, "interval#{id}"),
            ScheduleRef::Crontab(id) => write!(f, "crontab#{id}"),
        }
    }
}

/// A persisted `periodic_tasks` row.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: i64,
    pub name: String,
    /// Executable reference.
    pub task: String,
    pub schedule: ScheduleRef,
    pub enabled: bool,
    pub queue: Option<String>,
    pub priority: Option<i64>,
    /// Raw JSON text as stored.
    pub args: String,
    /// Raw JSON text as stored.
    pub kwargs: String,
    pub one_off: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    pub description: String,
    pub date_changed: String,
}

impl TaskRow {
    /// Whether the ownership marker is present.
    pub fn is_managed(&self) -> bool {
        self.description == MANAGED_DESCRIPTION
    }
}

/// The task-row fields the engine owns and compares, one entry per column
/// group. This list is the whole change-detection contract: anything not
/// named here (run counters, `last_run_at`, `description`) is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    /// `interval_id` / `crontab_id`.
    Schedule,
    Task,
    Enabled,
    Queue,
    Priority,
    Args,
    Kwargs,
    OneOff,
    Expires,
    /// Only written while the stored value is still NULL.
    StartTime,
}

impl TaskField {
    pub const ALL: [TaskField; 10] = [
        TaskField::Schedule,
        TaskField::Task,
        TaskField::Enabled,
        TaskField::Queue,
        TaskField::Priority,
        TaskField::Args,
        TaskField::Kwargs,
        TaskField::OneOff,
        TaskField::Expires,
        TaskField::StartTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskField::Schedule => "schedule",
            TaskField::Task => "task",
            TaskField::Enabled => "enabled",
            TaskField::Queue => "queue",
            TaskField::Priority => "priority",
            TaskField::Args => "args",
            TaskField::Kwargs => "kwargs",
            TaskField::OneOff => "one_off",
            TaskField::Expires => "expires",
            TaskField::StartTime => "start_time",
        }
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
