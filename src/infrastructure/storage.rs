use crate::domain::models::TodoRecord;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Persistence for todo records. Listing is newest-created first.
pub trait TodoRepository: Send + Sync {
    fn insert(&self, todo: &TodoRecord) -> Result<(), InfraError>;
    fn get(&self, id: &str) -> Result<Option<TodoRecord>, InfraError>;
    /// Returns `false` when no record with `todo.id` exists.
    fn replace(&self, todo: &TodoRecord) -> Result<bool, InfraError>;
    /// Returns `false` when no record with `id` exists.
    fn delete(&self, id: &str) -> Result<bool, InfraError>;
    fn list_recent(&self) -> Result<Vec<TodoRecord>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteTodoRepository {
    db_path: PathBuf,
}

impl SqliteTodoRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_document(raw: &str) -> Result<TodoRecord, InfraError> {
    serde_json::from_str(raw).map_err(InfraError::from)
}

impl TodoRepository for SqliteTodoRepository {
    fn insert(&self, todo: &TodoRecord) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let document = serde_json::to_string(todo)?;
        connection.execute(
            "INSERT INTO todos (id, document, status, due_date, google_event_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                todo.id,
                document,
                todo.status.as_str(),
                todo.due_date,
                todo.google_event_id,
                timestamp(&todo.created_at),
                timestamp(&todo.updated_at)
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<TodoRecord>, InfraError> {
        let connection = self.connect()?;
        let document: Option<String> = connection
            .query_row("SELECT document FROM todos WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        document.as_deref().map(decode_document).transpose()
    }

    fn replace(&self, todo: &TodoRecord) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let document = serde_json::to_string(todo)?;
        let changed = connection.execute(
            "UPDATE todos
             SET document = ?2, status = ?3, due_date = ?4, google_event_id = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                todo.id,
                document,
                todo.status.as_str(),
                todo.due_date,
                todo.google_event_id,
                timestamp(&todo.updated_at)
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, id: &str) -> Result<bool, InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn list_recent(&self) -> Result<Vec<TodoRecord>, InfraError> {
        let connection = self.connect()?;
        let mut statement =
            connection.prepare("SELECT document FROM todos ORDER BY created_at DESC, rowid DESC")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        let mut todos = Vec::new();
        for row in rows {
            match decode_document(&row?) {
                Ok(todo) => todos.push(todo),
                Err(error) => tracing::warn!(%error, "skipping undecodable todo document"),
            }
        }
        Ok(todos)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTodoRepository {
    todos: Mutex<HashMap<String, (u64, TodoRecord)>>,
    sequence: Mutex<u64>,
}

impl InMemoryTodoRepository {
    fn lock_todos(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (u64, TodoRecord)>>, InfraError> {
        self.todos
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("todo store lock poisoned: {error}")))
    }
}

impl TodoRepository for InMemoryTodoRepository {
    fn insert(&self, todo: &TodoRecord) -> Result<(), InfraError> {
        let order = {
            let mut sequence = self.sequence.lock().map_err(|error| {
                InfraError::InvalidConfig(format!("todo sequence lock poisoned: {error}"))
            })?;
            *sequence += 1;
            *sequence
        };
        let mut todos = self.lock_todos()?;
        if todos.contains_key(&todo.id) {
            return Err(InfraError::InvalidConfig(format!("duplicate todo id {}", todo.id)));
        }
        todos.insert(todo.id.clone(), (order, todo.clone()));
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<TodoRecord>, InfraError> {
        Ok(self.lock_todos()?.get(id).map(|(_, todo)| todo.clone()))
    }

    fn replace(&self, todo: &TodoRecord) -> Result<bool, InfraError> {
        let mut todos = self.lock_todos()?;
        let Some(entry) = todos.get_mut(&todo.id) else {
            return Ok(false);
        };
        entry.1 = todo.clone();
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<bool, InfraError> {
        Ok(self.lock_todos()?.remove(id).is_some())
    }

    fn list_recent(&self) -> Result<Vec<TodoRecord>, InfraError> {
        let todos = self.lock_todos()?;
        let mut entries: Vec<&(u64, TodoRecord)> = todos.values().collect();
        entries.sort_by(|left, right| {
            right
                .1
                .created_at
                .cmp(&left.1.created_at)
                .then_with(|| right.0.cmp(&left.0))
        });
        Ok(entries.into_iter().map(|(_, todo)| todo.clone()).collect())
    }
}
