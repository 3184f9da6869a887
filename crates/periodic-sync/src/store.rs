use chrono::{DateTime, Utc};
use periodic_registry::{CrontabFields, ScheduleDescriptor, TaskDefinition};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use crate::db::{init_db, tables_exist};
use crate::error::{Result, SyncError};
use crate::types::{ScheduleRef, TaskField, TaskRow, INTERVAL_PERIOD, MANAGED_DESCRIPTION};

/// What the reconciliation engine needs from the persistence layer.
///
/// Each method is a single bounded read or write; a full pass is not atomic.
pub trait PeriodicStore {
    /// Create the schema if it is missing.
    fn migrate(&self) -> Result<()>;

    /// Whether the schema exists.
    fn schema_ready(&self) -> Result<bool>;

    fn find_or_create_interval(&self, seconds: i64) -> Result<ScheduleRef>;

    /// `fields` must already be normalized.
    fn find_or_create_crontab(&self, fields: &CrontabFields) -> Result<ScheduleRef>;

    fn find_task_by_name(&self, name: &str) -> Result<Option<TaskRow>>;

    /// Insert a managed row for `definition`.
    fn create_task(&self, definition: &TaskDefinition, schedule: ScheduleRef) -> Result<TaskRow>;

    /// Overwrite only `fields` on row `id` with the values from `definition`.
    fn update_task(
        &self,
        id: i64,
        definition: &TaskDefinition,
        schedule: ScheduleRef,
        fields: &[TaskField],
    ) -> Result<()>;

    fn delete_task(&self, id: i64) -> Result<()>;

    /// Rows carrying the ownership marker.
    fn list_owned_tasks(&self) -> Result<Vec<TaskRow>>;

    /// Signal external schedulers that the task table changed.
    fn mark_changed(&self) -> Result<()>;
}

const TASK_SELECT_SQL: &str = "SELECT id, name, task, interval_id, crontab_id, enabled, queue,
        priority, args, kwargs, one_off, start_time, expires, description, date_changed
     FROM periodic_tasks";

/// Map a SELECT row (column order from TASK_SELECT_SQL) to a TaskRow.
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    let interval_id: Option<i64> = row.get(3)?;
    let crontab_id: Option<i64> = row.get(4)?;
    let schedule = match (interval_id, crontab_id) {
        (Some(id), _) => ScheduleRef::Interval(id),
        (None, Some(id)) => ScheduleRef::Crontab(id),
        (None, None) => {
            return Err(rusqlite::Error::InvalidColumnType(
                3,
                "interval_id".to_string(),
                Type::Null,
            ))
        }
    };
    Ok(TaskRow {
        id: row.get(0)?,
        name: row.get(1)?,
        task: row.get(2)?,
        schedule,
        enabled: row.get::<_, i64>(5)? != 0,
        queue: row.get(6)?,
        priority: row.get(7)?,
        args: row.get(8)?,
        kwargs: row.get(9)?,
        one_off: row.get::<_, i64>(10)? != 0,
        start_time: parse_timestamp(row.get(11)?),
        expires: parse_timestamp(row.get(12)?),
        description: row.get(13)?,
        date_changed: row.get(14)?,
    })
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn timestamp_value(at: Option<DateTime<Utc>>) -> SqlValue {
    at.map(|dt| dt.to_rfc3339()).into()
}

/// Column assignments for a partial UPDATE, numbered as they are added.
#[derive(Default)]
struct Assignments {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Assignments {
    fn set(&mut self, column: &str, value: SqlValue) {
        self.values.push(value);
        self.columns.push(format!("{column} = ?{}", self.values.len()));
    }
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Read back the descriptor a schedule row stands for.
    pub fn describe_schedule(&self, schedule: ScheduleRef) -> Result<ScheduleDescriptor> {
        match schedule {
            ScheduleRef::Interval(id) => {
                let seconds = self.conn.query_row(
                    "SELECT every FROM interval_schedules WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )?;
                Ok(ScheduleDescriptor::Interval { seconds })
            }
            ScheduleRef::Crontab(id) => {
                let fields = self.conn.query_row(
                    "SELECT minute, hour, day_of_month, month_of_year, day_of_week
                     FROM crontab_schedules WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(CrontabFields {
                            minute: row.get(0)?,
                            hour: row.get(1)?,
                            day_of_month: row.get(2)?,
                            month_of_year: row.get(3)?,
                            day_of_week: row.get(4)?,
                        })
                    },
                )?;
                Ok(ScheduleDescriptor::Crontab(fields))
            }
        }
    }
}

impl PeriodicStore for SqliteStore {
    fn migrate(&self) -> Result<()> {
        init_db(&self.conn)
    }

    fn schema_ready(&self) -> Result<bool> {
        tables_exist(&self.conn)
    }

    fn find_or_create_interval(&self, seconds: i64) -> Result<ScheduleRef> {
        let inserted = self.conn.execute(
            "INSERT INTO interval_schedules (every, period) VALUES (?1, ?2)
             ON CONFLICT (every, period) DO NOTHING",
            params![seconds, INTERVAL_PERIOD],
        )?;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM interval_schedules WHERE every = ?1 AND period = ?2",
            params![seconds, INTERVAL_PERIOD],
            |row| row.get(0),
        )?;
        if inserted > 0 {
            debug!(schedule_id = id, seconds, "interval schedule created");
        }
        Ok(ScheduleRef::Interval(id))
    }

    fn find_or_create_crontab(&self, fields: &CrontabFields) -> Result<ScheduleRef> {
        let values = params![
            fields.minute,
            fields.hour,
            fields.day_of_month,
            fields.month_of_year,
            fields.day_of_week
        ];
        let inserted = self.conn.execute(
            "INSERT INTO crontab_schedules
             (minute, hour, day_of_month, month_of_year, day_of_week)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (minute, hour, day_of_month, month_of_year, day_of_week) DO NOTHING",
            values,
        )?;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM crontab_schedules
             WHERE minute = ?1 AND hour = ?2 AND day_of_month = ?3
               AND month_of_year = ?4 AND day_of_week = ?5",
            values,
            |row| row.get(0),
        )?;
        if inserted > 0 {
            debug!(schedule_id = id, crontab = %fields, "crontab schedule created");
        }
        Ok(ScheduleRef::Crontab(id))
    }

    fn find_task_by_name(&self, name: &str) -> Result<Option<TaskRow>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{TASK_SELECT_SQL} WHERE name = ?1"))?;
        let row = stmt.query_row([name], row_to_task).optional()?;
        Ok(row)
    }

    fn create_task(&self, definition: &TaskDefinition, schedule: ScheduleRef) -> Result<TaskRow> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let start_time = definition.start_time.unwrap_or(now);
        let args = serde_json::to_string(&definition.args)?;
        let kwargs = serde_json::to_string(&definition.kwargs)?;

        self.conn.execute(
            "INSERT INTO periodic_tasks
             (name, task, interval_id, crontab_id, args, kwargs, queue, priority,
              enabled, one_off, start_time, expires, description, date_changed)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            params![
                definition.name,
                definition.task,
                schedule.interval_id(),
                schedule.crontab_id(),
                args,
                kwargs,
                definition.queue,
                definition.priority,
                definition.enabled,
                definition.one_off,
                start_time.to_rfc3339(),
                definition.expires.map(|dt| dt.to_rfc3339()),
                MANAGED_DESCRIPTION,
                now_str,
            ],
        )?;

        Ok(TaskRow {
            id: self.conn.last_insert_rowid(),
            name: definition.name.clone(),
            task: definition.task.clone(),
            schedule,
            enabled: definition.enabled,
            queue: definition.queue.clone(),
            priority: definition.priority,
            args,
            kwargs,
            one_off: definition.one_off,
            start_time: Some(start_time),
            expires: definition.expires,
            description: MANAGED_DESCRIPTION.to_string(),
            date_changed: now_str,
        })
    }

    fn update_task(
        &self,
        id: i64,
        definition: &TaskDefinition,
        schedule: ScheduleRef,
        fields: &[TaskField],
    ) -> Result<()> {
        let now = Utc::now();
        let mut set = Assignments::default();
        for field in fields {
            match field {
                TaskField::Schedule => {
                    set.set("interval_id", schedule.interval_id().into());
                    set.set("crontab_id", schedule.crontab_id().into());
                }
                TaskField::Task => set.set("task", definition.task.clone().into()),
                TaskField::Enabled => set.set("enabled", definition.enabled.into()),
                TaskField::Queue => set.set("queue", definition.queue.clone().into()),
                TaskField::Priority => set.set("priority", definition.priority.into()),
                TaskField::Args => {
                    set.set("args", serde_json::to_string(&definition.args)?.into())
                }
                TaskField::Kwargs => {
                    set.set("kwargs", serde_json::to_string(&definition.kwargs)?.into())
                }
                TaskField::OneOff => set.set("one_off", definition.one_off.into()),
                TaskField::Expires => set.set("expires", timestamp_value(definition.expires)),
                TaskField::StartTime => set.set(
                    "start_time",
                    timestamp_value(Some(definition.start_time.unwrap_or(now))),
                ),
            }
        }
        set.set("date_changed", now.to_rfc3339().into());

        let sql = format!(
            "UPDATE periodic_tasks SET {} WHERE id = ?{}",
            set.columns.join(", "),
            set.values.len() + 1
        );
        set.values.push(id.into());

        let n = self.conn.execute(&sql, params_from_iter(set.values))?;
        if n == 0 {
            return Err(SyncError::TaskNotFound { id });
        }
        Ok(())
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        let n = self
            .conn
            .execute("DELETE FROM periodic_tasks WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(SyncError::TaskNotFound { id });
        }
        Ok(())
    }

    fn list_owned_tasks(&self) -> Result<Vec<TaskRow>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{TASK_SELECT_SQL} WHERE description = ?1 ORDER BY name"
        ))?;
        let rows = stmt
            .query_map([MANAGED_DESCRIPTION], row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn mark_changed(&self) -> Result<()> {
        self.conn.execute(
            "INSERT INTO periodic_tasks_changed (ident, last_update) VALUES (1, ?1)
             ON CONFLICT (ident) DO UPDATE SET last_update = excluded.last_update",
            [Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use periodic_registry::TaskOptions;

    fn store() -> SqliteStore {
        let store = SqliteStore::new(Connection::open_in_memory().unwrap());
        store.migrate().unwrap();
        store
    }

    fn definition(name: &str) -> TaskDefinition {
        TaskOptions::new()
            .interval_secs(60)
            .name(name)
            .queue("default")
            .into_definition("app::job")
            .unwrap()
    }

    #[test]
    fn interval_find_or_create_reuses_rows() {
        let store = store();
        let a = store.find_or_create_interval(60).unwrap();
        let b = store.find_or_create_interval(60).unwrap();
        let c = store.find_or_create_interval(120).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            store.describe_schedule(c).unwrap(),
            ScheduleDescriptor::Interval { seconds: 120 }
        );
    }

    #[test]
    fn crontab_find_or_create_reuses_rows() {
        let store = store();
        let fields = CrontabFields::parse("*/5 * * * *").unwrap();
        let a = store.find_or_create_crontab(&fields).unwrap();
        let b = store.find_or_create_crontab(&fields).unwrap();
        assert_eq!(a, b);
        assert!(matches!(a, ScheduleRef::Crontab(_)));
        assert_eq!(
            store.describe_schedule(a).unwrap(),
            ScheduleDescriptor::Crontab(fields)
        );
    }

    #[test]
    fn created_row_round_trips() {
        let store = store();
        let schedule = store.find_or_create_interval(60).unwrap();
        let created = store.create_task(&definition("a"), schedule).unwrap();
        let loaded = store.find_task_by_name("a").unwrap().unwrap();

        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.schedule, schedule);
        assert_eq!(loaded.queue.as_deref(), Some("default"));
        assert_eq!(loaded.args, "[]");
        assert_eq!(loaded.kwargs, "{}");
        assert!(loaded.is_managed());
        assert!(loaded.start_time.is_some());
        assert_eq!(loaded.start_time, created.start_time);
    }

    #[test]
    fn update_touches_only_listed_fields() {
        let store = store();
        let schedule = store.find_or_create_interval(60).unwrap();
        let row = store.create_task(&definition("a"), schedule).unwrap();

        let mut changed = definition("a");
        changed.priority = Some(10);
        changed.queue = Some("ignored".to_string());
        store
            .update_task(row.id, &changed, schedule, &[TaskField::Priority])
            .unwrap();

        let loaded = store.find_task_by_name("a").unwrap().unwrap();
        assert_eq!(loaded.priority, Some(10));
        assert_eq!(loaded.queue.as_deref(), Some("default"));
    }

    #[test]
    fn update_switches_schedule_kind() {
        let store = store();
        let interval = store.find_or_create_interval(60).unwrap();
        let row = store.create_task(&definition("a"), interval).unwrap();

        let cron = store
            .find_or_create_crontab(&CrontabFields::parse("0 * * * *").unwrap())
            .unwrap();
        store
            .update_task(row.id, &definition("a"), cron, &[TaskField::Schedule])
            .unwrap();

        assert_eq!(store.find_task_by_name("a").unwrap().unwrap().schedule, cron);
    }

    #[test]
    fn missing_rows_report_not_found() {
        let store = store();
        assert!(matches!(
            store.delete_task(42),
            Err(SyncError::TaskNotFound { id: 42 })
        ));
        let schedule = store.find_or_create_interval(60).unwrap();
        assert!(matches!(
            store.update_task(42, &definition("a"), schedule, &[TaskField::Enabled]),
            Err(SyncError::TaskNotFound { id: 42 })
        ));
    }

    #[test]
    fn owned_listing_skips_foreign_rows() {
        let store = store();
        let schedule = store.find_or_create_interval(60).unwrap();
        store.create_task(&definition("mine"), schedule).unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO periodic_tasks (name, task, interval_id, description, date_changed)
                 VALUES ('theirs', 'app::manual', ?1, 'created by hand', 'now')",
                [schedule.interval_id()],
            )
            .unwrap();

        let owned = store.list_owned_tasks().unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "mine");
    }

    fn last_update(store: &SqliteStore) -> Option<String> {
        store
            .connection()
            .query_row(
                "SELECT last_update FROM periodic_tasks_changed WHERE ident = 1",
                [],
                |r| r.get(0),
            )
            .optional()
            .unwrap()
    }

    #[test]
    fn mark_changed_upserts_single_row() {
        let store = store();
        assert!(last_update(&store).is_none());
        store.mark_changed().unwrap();
        store.mark_changed().unwrap();
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM periodic_tasks_changed", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert!(last_update(&store).is_some());
    }
}
