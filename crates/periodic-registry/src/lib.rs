//! `periodic-registry`: the code-side half of periodic task sync.
//!
//! Applications describe their periodic jobs here; `periodic-sync` later
//! makes the database match.
//!
//! # Schedules
//!
//! | Variant    | Behaviour                                              |
//! |------------|--------------------------------------------------------|
//! | `Interval` | Repeat every N seconds (N ≥ 1)                         |
//! | `Crontab`  | Five cron fields; missing fields default to `*`        |
//!
//! Crontab fields accept `*`, numbers, `a-b` ranges, `/step` and comma lists.
//! Month and weekday fields also accept names (`jan`, `monday`, ...).

pub mod definition;
pub mod error;
pub mod registry;
pub mod runtime;
pub mod schedule;

pub use definition::{TaskDefinition, TaskOptions};
pub use error::{ConfigurationError, Result};
pub use registry::TaskRegistry;
pub use runtime::{
    register_periodic_task, JobHandle, JobRuntime, LocalRuntime, TaskError, TaskFn, TaskResult,
};
pub use schedule::{CronField, CrontabFields, ScheduleDescriptor};
