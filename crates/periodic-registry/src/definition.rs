use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, Result};
use crate::schedule::{CrontabFields, ScheduleDescriptor};

/// Desired state of one named periodic task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// Unique key shared with the persisted task row.
    pub name: String,
    /// Path the execution runtime uses to locate the job.
    pub task: String,
    pub schedule: ScheduleDescriptor,
    pub enabled: bool,
    pub queue: Option<String>,
    pub priority: Option<i64>,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    /// Disable the task after its first run.
    pub one_off: bool,
    pub expires: Option<DateTime<Utc>>,
    /// First eligible run. `None` lets the store stamp the creation time.
    pub start_time: Option<DateTime<Utc>>,
}

/// How the crontab was supplied to [`TaskOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum CrontabSpec {
    Expression(String),
    Fields(CrontabFields),
}

/// Registration options, the builder behind [`crate::periodic_task!`].
///
/// Exactly one of an interval or a crontab must be set; this is checked when
/// the options are turned into a [`TaskDefinition`].
#[derive(Debug, Clone)]
pub struct TaskOptions {
    interval: Option<i64>,
    crontab: Option<CrontabSpec>,
    name: Option<String>,
    enabled: bool,
    queue: Option<String>,
    priority: Option<i64>,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    one_off: bool,
    expires: Option<DateTime<Utc>>,
    start_time: Option<DateTime<Utc>>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            interval: None,
            crontab: None,
            name: None,
            enabled: true,
            queue: None,
            priority: None,
            args: Vec::new(),
            kwargs: Map::new(),
            one_off: false,
            expires: None,
            start_time: None,
        }
    }
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval_secs(mut self, seconds: i64) -> Self {
        self.interval = Some(seconds);
        self
    }

    /// Interval as a duration; any sub-second remainder is dropped.
    pub fn every(self, interval: Duration) -> Self {
        let seconds = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX);
        self.interval_secs(seconds)
    }

    /// Five-field cron expression, e.g. `"*/5 * * * *"`.
    pub fn crontab(mut self, expression: impl Into<String>) -> Self {
        self.crontab = Some(CrontabSpec::Expression(expression.into()));
        self
    }

    /// Named crontab fields; anything left at its default means `"*"`.
    pub fn crontab_fields(mut self, fields: CrontabFields) -> Self {
        self.crontab = Some(CrontabSpec::Fields(fields));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn one_off(mut self, one_off: bool) -> Self {
        self.one_off = one_off;
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn start_time(mut self, at: DateTime<Utc>) -> Self {
        self.start_time = Some(at);
        self
    }

    /// Validate the options and build the definition for the job at `task_path`.
    ///
    /// The task name defaults to `task_path`.
    pub fn into_definition(self, task_path: &str) -> Result<TaskDefinition> {
        let schedule = match (self.interval, self.crontab) {
            (Some(_), Some(_)) => {
                return Err(ConfigurationError::BothSchedules {
                    task: task_path.to_string(),
                })
            }
            (None, None) => {
                return Err(ConfigurationError::MissingSchedule {
                    task: task_path.to_string(),
                })
            }
            (Some(seconds), None) => ScheduleDescriptor::interval(seconds)?,
            (None, Some(CrontabSpec::Expression(expr))) => ScheduleDescriptor::crontab(&expr)?,
            (None, Some(CrontabSpec::Fields(fields))) => {
                ScheduleDescriptor::Crontab(fields.normalized()?)
            }
        };

        let name = self.name.unwrap_or_else(|| task_path.to_string());
        if name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }

        Ok(TaskDefinition {
            name,
            task: task_path.to_string(),
            schedule,
            enabled: self.enabled,
            queue: self.queue,
            priority: self.priority,
            args: self.args,
            kwargs: self.kwargs,
            one_off: self.one_off,
            expires: self.expires,
            start_time: self.start_time,
        })
    }
}
