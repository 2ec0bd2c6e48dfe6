mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;

const TASK_COLUMNS: &str =
    "id, user_id, name, is_completed, priority, category, tags, parent_task_id, created_at, updated_at";

/// A rejected write. The message is safe to show to the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Task name cannot be empty")]
    EmptyName,

    #[error("Parent task not found: {0}")]
    ParentNotFound(Uuid),

    #[error("A task cannot be its own parent")]
    SelfParent,

    #[error("A task cannot be moved under one of its own subtasks")]
    ParentCycle,
}

/// Storage operations the breakdown pipeline depends on.
///
/// `create_tasks` is all-or-nothing: either every record is inserted or none is.
pub trait TaskStore: Send + Sync {
    fn find_task(&self, id: Uuid, user_id: &str) -> Result<Option<Task>>;

    fn create_tasks(&self, records: Vec<NewTask>) -> Result<Vec<Task>>;
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Platform data directory location, e.g. `~/.local/share/taskbreak/taskbreak.db`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "taskbreak")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("taskbreak.db"))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        schema::run_migrations(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    /// Run `f` inside a single transaction.
    ///
    /// Commits when `f` returns `Ok`. On `Err`, or a panic inside `f`, the
    /// `Transaction` is dropped uncommitted, which rolls it back; nothing `f`
    /// wrote is visible to other readers.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    /// Low-level access for callers that need raw SQL, such as test fixtures.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    // ============================================================
    // Task operations
    // ============================================================

    pub fn get_task(&self, id: Uuid, user_id: &str) -> Result<Option<Task>> {
        let conn = self.lock()?;
        find_task_in(&conn, id, user_id)
    }

    pub fn get_tasks_by_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE user_id = ? ORDER BY created_at, rowid",
            TASK_COLUMNS
        ))?;

        let tasks = stmt
            .query_map([user_id], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    /// Direct children of a task, in creation order.
    pub fn get_subtasks(&self, parent_id: Uuid, user_id: &str) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE parent_task_id = ? AND user_id = ?
             ORDER BY created_at, rowid",
            TASK_COLUMNS
        ))?;

        let tasks = stmt
            .query_map((parent_id.to_string(), user_id), task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    pub fn create_task(&self, user_id: &str, input: CreateTaskInput) -> Result<Task> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let record = NewTask {
            user_id: user_id.to_string(),
            name: name.to_string(),
            priority: input.priority.unwrap_or_default(),
            category: input.category,
            tags: input.tags.unwrap_or_default(),
            parent_task_id: input.parent_task_id,
            created_at: input.created_at.unwrap_or_else(Utc::now),
        };

        let conn = self.lock()?;
        ensure_parent(&conn, record.parent_task_id, user_id)?;
        insert_task(&conn, &record, input.is_completed.unwrap_or(false))
    }

    pub fn update_task(
        &self,
        id: Uuid,
        user_id: &str,
        input: UpdateTaskInput,
    ) -> Result<Option<Task>> {
        let conn = self.lock()?;
        let Some(existing) = find_task_in(&conn, id, user_id)? else {
            return Ok(None);
        };

        let name = match input.name {
            Some(name) if name.trim().is_empty() => return Err(ValidationError::EmptyName.into()),
            Some(name) => name.trim().to_string(),
            None => existing.name,
        };

        if input.parent_task_id == Some(id) {
            return Err(ValidationError::SelfParent.into());
        }
        ensure_parent(&conn, input.parent_task_id, user_id)?;
        if let Some(parent_id) = input.parent_task_id {
            if is_ancestor(&conn, id, parent_id)? {
                return Err(ValidationError::ParentCycle.into());
            }
        }

        let now = Utc::now();
        let is_completed = input.is_completed.unwrap_or(existing.is_completed);
        let priority = input.priority.unwrap_or(existing.priority);
        let category = input.category.or(existing.category);
        let tags = input.tags.unwrap_or(existing.tags);
        let parent_task_id = input.parent_task_id.or(existing.parent_task_id);

        conn.execute(
            "UPDATE tasks SET name = ?, is_completed = ?, priority = ?, category = ?, tags = ?,
             parent_task_id = ?, updated_at = ? WHERE id = ? AND user_id = ?",
            (
                &name,
                is_completed,
                priority.as_str(),
                &category,
                serde_json::to_string(&tags)?,
                parent_task_id.map(|u| u.to_string()),
                now.to_rfc3339(),
                id.to_string(),
                user_id,
            ),
        )?;

        Ok(Some(Task {
            id,
            user_id: existing.user_id,
            name,
            is_completed,
            priority,
            category,
            tags,
            parent_task_id,
            created_at: existing.created_at,
            updated_at: now,
        }))
    }

    /// Delete a task owned by `user_id`. Subtasks go with it.
    pub fn delete_task(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM tasks WHERE id = ? AND user_id = ?",
            (id.to_string(), user_id),
        )?;
        Ok(rows > 0)
    }
}

impl TaskStore for Database {
    fn find_task(&self, id: Uuid, user_id: &str) -> Result<Option<Task>> {
        self.get_task(id, user_id)
    }

    fn create_tasks(&self, records: Vec<NewTask>) -> Result<Vec<Task>> {
        self.with_transaction(|tx| {
            let mut created = Vec::with_capacity(records.len());
            for record in &records {
                ensure_parent(tx, record.parent_task_id, &record.user_id)?;
                created.push(insert_task(tx, record, false)?);
            }
            Ok(created)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn find_task_in(conn: &Connection, id: Uuid, user_id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!(
                "SELECT {} FROM tasks WHERE id = ? AND user_id = ?",
                TASK_COLUMNS
            ),
            (id.to_string(), user_id),
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

/// Parents must exist and belong to the same user.
fn ensure_parent(conn: &Connection, parent_id: Option<Uuid>, user_id: &str) -> Result<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ? AND user_id = ?)",
        (parent_id.to_string(), user_id),
        |row| row.get(0),
    )?;

    if exists {
        Ok(())
    } else {
        Err(ValidationError::ParentNotFound(parent_id).into())
    }
}

/// Whether `ancestor` is `task` itself or anywhere on its parent chain.
fn is_ancestor(conn: &Connection, ancestor: Uuid, task: Uuid) -> Result<bool> {
    let found = conn.query_row(
        "WITH RECURSIVE chain(id) AS (
             SELECT ?1
             UNION
             SELECT t.parent_task_id FROM tasks t JOIN chain c ON t.id = c.id
             WHERE t.parent_task_id IS NOT NULL
         )
         SELECT EXISTS(SELECT 1 FROM chain WHERE id = ?2)",
        (task.to_string(), ancestor.to_string()),
        |row| row.get(0),
    )?;
    Ok(found)
}

fn insert_task(conn: &Connection, record: &NewTask, is_completed: bool) -> Result<Task> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO tasks (id, user_id, name, is_completed, priority, category, tags,
                            parent_task_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            id.to_string(),
            &record.user_id,
            &record.name,
            is_completed,
            record.priority.as_str(),
            &record.category,
            serde_json::to_string(&record.tags)?,
            record.parent_task_id.map(|u| u.to_string()),
            record.created_at.to_rfc3339(),
            now.to_rfc3339(),
        ),
    )
    .with_context(|| format!("Failed to insert task '{}'", record.name))?;

    Ok(Task {
        id,
        user_id: record.user_id.clone(),
        name: record.name.clone(),
        is_completed,
        priority: record.priority,
        category: record.category.clone(),
        tags: record.tags.clone(),
        parent_task_id: record.parent_task_id,
        created_at: record.created_at,
        updated_at: now,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let tags_json: String = row.get(6)?;
    Ok(Task {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: row.get(1)?,
        name: row.get(2)?,
        is_completed: row.get(3)?,
        priority: Priority::from_str(&row.get::<_, String>(4)?).unwrap_or_default(),
        category: row.get(5)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        parent_task_id: row.get::<_, Option<String>>(7)?.map(parse_uuid),
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
