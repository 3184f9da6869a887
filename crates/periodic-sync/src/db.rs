use rusqlite::Connection;

use crate::error::Result;

const TABLES: [&str; 4] = [
    "interval_schedules",
    "crontab_schedules",
    "periodic_tasks",
    "periodic_tasks_changed",
];

/// Initialise the schedule and task tables in `conn`. Idempotent.
///
/// Schedule tables are unique over their descriptor columns so concurrent
/// find-or-create calls cannot produce duplicate rows.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS interval_schedules (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            every   INTEGER NOT NULL CHECK (every > 0),
            period  TEXT    NOT NULL DEFAULT 'seconds',
            UNIQUE (every, period)
        );

        CREATE TABLE IF NOT EXISTS crontab_schedules (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            minute          TEXT NOT NULL DEFAULT '*',
            hour            TEXT NOT NULL DEFAULT '*',
            day_of_month    TEXT NOT NULL DEFAULT '*',
            month_of_year   TEXT NOT NULL DEFAULT '*',
            day_of_week     TEXT NOT NULL DEFAULT '*',
            UNIQUE (minute, hour, day_of_month, month_of_year, day_of_week)
        );

        CREATE TABLE IF NOT EXISTS periodic_tasks (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT    NOT NULL UNIQUE,
            task            TEXT    NOT NULL,
            interval_id     INTEGER REFERENCES interval_schedules(id),
            crontab_id      INTEGER REFERENCES crontab_schedules(id),
            args            TEXT    NOT NULL DEFAULT '[]',  -- JSON array
            kwargs          TEXT    NOT NULL DEFAULT '{}',  -- JSON object
            queue           TEXT,
            priority        INTEGER,
            enabled         INTEGER NOT NULL DEFAULT 1,
            one_off         INTEGER NOT NULL DEFAULT 0,
            start_time      TEXT,                           -- ISO-8601 or NULL
            expires         TEXT,                           -- ISO-8601 or NULL
            description     TEXT    NOT NULL DEFAULT '',    -- ownership marker lives here
            total_run_count INTEGER NOT NULL DEFAULT 0,
            last_run_at     TEXT,
            date_changed    TEXT    NOT NULL,
            CHECK ((interval_id IS NULL) <> (crontab_id IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_periodic_tasks_description
            ON periodic_tasks (description);

        -- Single row bumped whenever a pass changes anything.
        CREATE TABLE IF NOT EXISTS periodic_tasks_changed (
            ident       INTEGER PRIMARY KEY CHECK (ident = 1),
            last_update TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// True when every table the sync engine touches exists.
pub fn tables_exist(conn: &Connection) -> Result<bool> {
    let found: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type = 'table' AND name IN (?1, ?2, ?3, ?4)",
        rusqlite::params![TABLES[0], TABLES[1], TABLES[2], TABLES[3]],
        |row| row.get(0),
    )?;
    Ok(found as usize == TABLES.len())
}
