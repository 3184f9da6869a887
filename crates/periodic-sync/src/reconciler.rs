use periodic_registry::TaskDefinition;
use serde_json::Value;
use tracing::info;

use crate::error::{Result, SyncError};
use crate::store::PeriodicStore;
use crate::types::{ScheduleRef, TaskField, TaskRow};

/// What reconciling one definition did to its task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    /// The listed fields were rewritten; nothing else was touched.
    Updated(Vec<TaskField>),
    Unchanged,
}

/// Brings one persisted task row in line with its definition.
pub struct TaskReconciler<'s, S: PeriodicStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: PeriodicStore + ?Sized> TaskReconciler<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Create, update or leave alone the row named `definition.name`.
    ///
    /// A same-named row without the ownership marker is a conflict and is
    /// never written.
    pub fn reconcile(
        &self,
        definition: &TaskDefinition,
        schedule: ScheduleRef,
    ) -> Result<ReconcileOutcome> {
        let Some(row) = self.store.find_task_by_name(&definition.name)? else {
            let row = self.store.create_task(definition, schedule)?;
            info!(task = %row.name, task_id = row.id, %schedule, "periodic task created");
            return Ok(ReconcileOutcome::Created);
        };

        if !row.is_managed() {
            return Err(SyncError::OwnershipConflict {
                name: row.name,
                description: row.description,
            });
        }

        let fields = changed_fields(&row, definition, schedule);
        if fields.is_empty() {
            return Ok(ReconcileOutcome::Unchanged);
        }

        self.store
            .update_task(row.id, definition, schedule, &fields)?;
        let changed: Vec<&str> = fields.iter().map(|f| f.name()).collect();
        info!(task = %row.name, task_id = row.id, ?changed, "periodic task updated");
        Ok(ReconcileOutcome::Updated(fields))
    }
}

/// Owned fields where `row` differs from what `definition` wants.
pub fn changed_fields(
    row: &TaskRow,
    definition: &TaskDefinition,
    schedule: ScheduleRef,
) -> Vec<TaskField> {
    TaskField::ALL
        .into_iter()
        .filter(|field| differs(*field, row, definition, schedule))
        .collect()
}

fn differs(field: TaskField, row: &TaskRow, def: &TaskDefinition, schedule: ScheduleRef) -> bool {
    match field {
        TaskField::Schedule => row.schedule != schedule,
        TaskField::Task => row.task != def.task,
        TaskField::Enabled => row.enabled != def.enabled,
        TaskField::Queue => row.queue != def.queue,
        TaskField::Priority => row.priority != def.priority,
        TaskField::Args => !stored_json_equals(&row.args, &Value::from(def.args.clone())),
        TaskField::Kwargs => !stored_json_equals(&row.kwargs, &Value::from(def.kwargs.clone())),
        TaskField::OneOff => row.one_off != def.one_off,
        TaskField::Expires => row.expires != def.expires,
        // A start time already on record is kept.
        TaskField::StartTime => row.start_time.is_none(),
    }
}

/// Compare by value so key order and whitespace in the stored text don't matter.
/// Unparseable stored JSON always counts as a difference.
fn stored_json_equals(stored: &str, wanted: &Value) -> bool {
    serde_json::from_str::<Value>(stored).is_ok_and(|value| &value == wanted)
}
