use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tracing::debug;

use crate::definition::TaskOptions;
use crate::error::Result;
use crate::registry::TaskRegistry;

pub type TaskError = Box<dyn std::error::Error + Send + Sync>;
pub type TaskResult = std::result::Result<Value, TaskError>;

/// A callable job: receives the stored positional and keyword arguments.
pub type TaskFn = Arc<dyn Fn(&[Value], &Map<String, Value>) -> TaskResult + Send + Sync>;

/// The execution runtime's job-registration capability.
///
/// Implementations make `func` locatable under `path` and hand back a handle
/// the application can call directly.
pub trait JobRuntime: Send + Sync {
    fn wrap(&self, path: &str, func: TaskFn) -> JobHandle;
}

/// A job wrapped by a [`JobRuntime`].
#[derive(Clone)]
pub struct JobHandle {
    path: String,
    func: TaskFn,
}

impl JobHandle {
    pub fn new(path: impl Into<String>, func: TaskFn) -> Self {
        Self {
            path: path.into(),
            func,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn call(&self, args: &[Value], kwargs: &Map<String, Value>) -> TaskResult {
        (self.func)(args, kwargs)
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").field("path", &self.path).finish()
    }
}

/// In-process runtime: a path → callable table.
#[derive(Default)]
pub struct LocalRuntime {
    jobs: RwLock<HashMap<String, TaskFn>>,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate a wrapped job by its path.
    pub fn lookup(&self, path: &str) -> Option<JobHandle> {
        let jobs = self.jobs.read().expect("job table poisoned");
        jobs.get(path).map(|func| JobHandle::new(path, Arc::clone(func)))
    }
}

impl JobRuntime for LocalRuntime {
    fn wrap(&self, path: &str, func: TaskFn) -> JobHandle {
        let mut jobs = self.jobs.write().expect("job table poisoned");
        jobs.insert(path.to_string(), Arc::clone(&func));
        debug!(path, "job wrapped");
        JobHandle::new(path, func)
    }
}

/// Register `func` as a periodic task and wrap it as an executable job.
///
/// `path` is the job's qualified path; it doubles as the task name unless the
/// options set one. Invalid schedules are rejected before anything is
/// registered.
pub fn register_periodic_task<F>(
    registry: &TaskRegistry,
    runtime: &dyn JobRuntime,
    path: &str,
    options: TaskOptions,
    func: F,
) -> Result<JobHandle>
where
    F: Fn(&[Value], &Map<String, Value>) -> TaskResult + Send + Sync + 'static,
{
    let definition = options.into_definition(path)?;
    registry.register(definition)?;
    Ok(runtime.wrap(path, Arc::new(func)))
}

/// Register a function as a periodic task under its module-qualified path.
///
/// ```ignore
/// fn heartbeat(_: &[Value], _: &Map<String, Value>) -> TaskResult { Ok(Value::Null) }
///
/// let job = periodic_task!(&registry, &runtime, TaskOptions::new().interval_secs(60), heartbeat)?;
/// assert!(job.path().ends_with("::heartbeat"));
/// ```
#[macro_export]
macro_rules! periodic_task {
    ($registry:expr, $runtime:expr, $options:expr, $func:ident) => {
        $crate::register_periodic_task(
            $registry,
            $runtime,
            concat!(module_path!(), "::", stringify!($func)),
            $options,
            $func,
        )
    };
}
