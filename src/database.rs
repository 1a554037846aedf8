use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{Frequency, Habit, Task};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no task with id {0}")]
    TaskNotFound(i64),
    #[error("no habit with id {0}")]
    HabitNotFound(i64),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Where the database lives when neither `--database` nor `PRODUCTIVITY_DB`
/// says otherwise: `~/.assistant/assistant.sqlite`.
pub fn default_db_path() -> Option<PathBuf> {
    let home: PathBuf = env::var_os("HOME")?.into();
    let dir = home.join(".assistant");
    if !dir.is_dir() {
        fs::create_dir_all(&dir).ok();
    }
    Some(dir.join("assistant.sqlite"))
}

/// Owns the sqlite connection. Every mutating operation commits immediately
/// (rusqlite autocommit); there is no batching or rollback surface.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> StoreResult<Store> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        info!(path = %path.display(), "opened database");
        Ok(Store { conn })
    }

    /// In-memory store, used by tests for isolation.
    pub fn open_in_memory() -> StoreResult<Store> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Store { conn })
    }

    pub fn add_task(
        &self,
        title: &str,
        description: &str,
        due_date: NaiveDateTime,
    ) -> StoreResult<Task> {
        self.conn.execute(
            "INSERT INTO tasks (title, description, due_date, completed) VALUES (?1, ?2, ?3, ?4)",
            params![title, description, due_date, false],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, title, "added task");
        Ok(Task {
            id,
            title: title.to_string(),
            description: description.to_string(),
            due_date,
            completed: false,
        })
    }

    /// All tasks in rowid order.
    pub fn list_tasks(&self) -> StoreResult<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, description, due_date, completed FROM tasks ORDER BY id")?;
        let rows = stmt.query_map(params![], |row| {
            Ok(Task {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                due_date: row.get(3)?,
                completed: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Errors with `TaskNotFound` instead of silently succeeding when the id
    /// does not exist. Setting the same value twice is fine.
    pub fn update_task_status(&self, id: i64, completed: bool) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET completed = ?2 WHERE id = ?1",
            params![id, completed],
        )?;
        if changed == 0 {
            return Err(StoreError::TaskNotFound(id));
        }
        debug!(id, completed, "updated task status");
        Ok(())
    }

    pub fn delete_task(&self, id: i64) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?", params![id])?;
        if changed == 0 {
            return Err(StoreError::TaskNotFound(id));
        }
        debug!(id, "deleted task");
        Ok(())
    }

    /// Convenience lookup by title. Titles are not unique; when several tasks
    /// share one, the first in rowid order wins. Ids are the addressing key
    /// everywhere else.
    pub fn find_task_by_title(&self, title: &str) -> StoreResult<Option<Task>> {
        let task = self
            .conn
            .query_row(
                "SELECT id, title, description, due_date, completed FROM tasks
                 WHERE title = ?1 ORDER BY id LIMIT 1",
                params![title],
                |row| {
                    Ok(Task {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        due_date: row.get(3)?,
                        completed: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(task)
    }

    pub fn add_habit(&self, name: &str, frequency: Frequency) -> StoreResult<Habit> {
        let last_logged = Local::now().naive_local();
        self.conn.execute(
            "INSERT INTO habits (name, frequency, last_logged) VALUES (?1, ?2, ?3)",
            params![name, frequency, last_logged],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, name, %frequency, "added habit");
        Ok(Habit {
            id,
            name: name.to_string(),
            frequency,
            last_logged,
        })
    }

    /// All habits in rowid order.
    pub fn list_habits(&self) -> StoreResult<Vec<Habit>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, frequency, last_logged FROM habits ORDER BY id")?;
        let rows = stmt.query_map(params![], |row| {
            Ok(Habit {
                id: row.get(0)?,
                name: row.get(1)?,
                frequency: row.get(2)?,
                last_logged: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Stamps the habit as logged right now and returns the new timestamp.
    pub fn log_habit(&self, id: i64) -> StoreResult<NaiveDateTime> {
        let now = Local::now().naive_local();
        let changed = self.conn.execute(
            "UPDATE habits SET last_logged = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        if changed == 0 {
            return Err(StoreError::HabitNotFound(id));
        }
        debug!(id, "logged habit");
        Ok(now)
    }
}

fn init_db(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            due_date TEXT NOT NULL,
            completed BOOLEAN NOT NULL DEFAULT 0
        )",
        params![],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS habits (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            frequency TEXT NOT NULL,
            last_logged TEXT NOT NULL
        )",
        params![],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn due(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn add_task_then_list_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let added = store
            .add_task("Write report", "Quarterly numbers", due(2026, 9, 1))
            .unwrap();

        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0], added);
        assert!(!tasks[0].completed);
        assert_eq!(tasks[0].title, "Write report");
        assert_eq!(tasks[0].description, "Quarterly numbers");
        assert_eq!(tasks[0].due_date, due(2026, 9, 1));
    }

    #[test]
    fn update_task_status_persists_and_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let task = store.add_task("a", "", due(2026, 1, 1)).unwrap();

        store.update_task_status(task.id, true).unwrap();
        assert!(store.list_tasks().unwrap()[0].completed);

        store.update_task_status(task.id, true).unwrap();
        assert!(store.list_tasks().unwrap()[0].completed);
    }

    #[test]
    fn update_unknown_task_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.update_task_status(42, true).unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound(42)));
    }

    #[test]
    fn delete_task_removes_it() {
        let store = Store::open_in_memory().unwrap();
        let keep = store.add_task("keep", "", due(2026, 1, 1)).unwrap();
        let gone = store.add_task("gone", "", due(2026, 1, 2)).unwrap();

        store.delete_task(gone.id).unwrap();
        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, keep.id);

        let err = store.delete_task(gone.id).unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound(_)));
    }

    #[test]
    fn find_by_title_takes_first_match_in_rowid_order() {
        let store = Store::open_in_memory().unwrap();
        let first = store.add_task("dup", "one", due(2026, 1, 1)).unwrap();
        store.add_task("dup", "two", due(2026, 1, 2)).unwrap();

        let found = store.find_task_by_title("dup").unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(found.description, "one");

        assert!(store.find_task_by_title("missing").unwrap().is_none());
    }

    #[test]
    fn add_habit_sets_last_logged() {
        let store = Store::open_in_memory().unwrap();
        let habit = store.add_habit("Stretch", Frequency::Daily).unwrap();

        let habits = store.list_habits().unwrap();
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].name, "Stretch");
        assert_eq!(habits[0].frequency, Frequency::Daily);
        assert_eq!(habits[0].last_logged, habit.last_logged);
        assert!(habit.last_logged <= Local::now().naive_local());
    }

    #[test]
    fn log_habit_advances_last_logged() {
        let store = Store::open_in_memory().unwrap();
        let habit = store.add_habit("Run", Frequency::Weekly).unwrap();

        let stamped = store.log_habit(habit.id).unwrap();
        assert!(stamped >= habit.last_logged);

        let reread = &store.list_habits().unwrap()[0];
        assert!(reread.last_logged >= habit.last_logged);
    }

    #[test]
    fn log_unknown_habit_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.log_habit(7).unwrap_err();
        assert!(matches!(err, StoreError::HabitNotFound(7)));
    }

    #[test]
    fn open_creates_file_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant.sqlite");

        {
            let store = Store::open(&path).unwrap();
            store.add_task("persisted", "", due(2026, 2, 2)).unwrap();
        }

        let store = Store::open(&path).unwrap();
        let tasks = store.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "persisted");
    }
}
