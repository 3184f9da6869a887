use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::definition::TaskDefinition;
use crate::error::{ConfigurationError, Result};

/// Collection of desired task definitions keyed by name.
///
/// Owned by the host application and handed to the sync driver; there is no
/// process-global instance. Registration takes `&self` so a shared reference
/// can be threaded through module initialisers.
#[derive(Default)]
pub struct TaskRegistry {
    inner: RwLock<Entries>,
}

#[derive(Default)]
struct Entries {
    /// Names in first-registration order.
    order: Vec<String>,
    by_name: HashMap<String, TaskDefinition>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the definition keyed by `definition.name`.
    ///
    /// Re-registering a name replaces the earlier definition (last one wins)
    /// but keeps its original position in iteration order.
    pub fn register(&self, mut definition: TaskDefinition) -> Result<()> {
        if definition.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        definition.schedule = definition.schedule.normalized()?;

        let mut entries = self.inner.write().expect("task registry poisoned");
        let name = definition.name.clone();
        if entries.by_name.insert(name.clone(), definition).is_some() {
            debug!(task = %name, "task definition replaced");
        } else {
            debug!(task = %name, "task definition registered");
            entries.order.push(name);
        }
        Ok(())
    }

    /// All current definitions in registration order.
    pub fn all_definitions(&self) -> Vec<TaskDefinition> {
        let entries = self.inner.read().expect("task registry poisoned");
        entries
            .order
            .iter()
            .filter_map(|name| entries.by_name.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("task registry poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every definition. Meant for test isolation.
    pub fn clear(&self) {
        let mut entries = self.inner.write().expect("task registry poisoned");
        entries.order.clear();
        entries.by_name.clear();
    }
}
