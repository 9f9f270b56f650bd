use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use evotrace_types::{Task, TaskId, TaskStatus};

use crate::error::{self, Result};
use crate::util::{now_ms, to_json};

fn status_from_db(s: &str) -> Result<TaskStatus> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "running" => Ok(TaskStatus::Running),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        other => Err(error::validation(format!("unknown task status '{other}'"))),
    }
}

type TaskRow = (String, String, Option<String>, Option<String>, String, i64, Option<i64>, Option<i64>, Option<String>);

fn row_to_task(row: &Row) -> rusqlite::Result<TaskRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn assemble(
    (id, input, task_type, origin, status, created_at, started_at, completed_at, metadata): TaskRow,
) -> Result<Task> {
    Ok(Task {
        id: id.parse().map_err(|e| error::validation(format!("malformed task id: {e}")))?,
        input: serde_json::from_str(&input).unwrap_or(Value::Null),
        task_type,
        origin,
        status: status_from_db(&status)?,
        created_at,
        started_at,
        completed_at,
        metadata: metadata.map(|m| serde_json::from_str(&m).unwrap_or(Value::Null)),
    })
}

pub fn create(conn: &Connection, input: Value, metadata: Option<Value>) -> Result<Task> {
    let task = Task {
        id: TaskId::new(),
        input,
        task_type: None,
        origin: None,
        status: TaskStatus::Pending,
        created_at: now_ms(),
        started_at: None,
        completed_at: None,
        metadata,
    };
    conn.execute(
        "INSERT INTO tasks (id, input, task_type, origin, status, created_at, started_at, completed_at, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            task.id.to_string(),
            to_json(&task.input)?,
            task.task_type,
            task.origin,
            task.status.as_str(),
            task.created_at,
            task.started_at,
            task.completed_at,
            task.metadata.as_ref().map(to_json).transpose()?,
        ],
    )?;
    Ok(task)
}

pub fn get(conn: &Connection, id: TaskId) -> Result<Task> {
    let row = conn
        .query_row(
            "SELECT id, input, task_type, origin, status, created_at, started_at, completed_at, metadata
             FROM tasks WHERE id = ?1",
            params![id.to_string()],
            row_to_task,
        )
        .optional()?;
    match row {
        Some(row) => assemble(row),
        None => Err(error::not_found(format!("task '{id}' not found"))),
    }
}

#[derive(Debug, Default, Clone)]
pub struct TaskUpdate {
    pub task_type: Option<String>,
    pub origin: Option<String>,
    pub status: Option<TaskStatus>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub metadata: Option<Value>,
}

pub fn update(conn: &Connection, id: TaskId, patch: TaskUpdate) -> Result<Task> {
    let mut task = get(conn, id)?;
    if let Some(v) = patch.task_type {
        task.task_type = Some(v);
    }
    if let Some(v) = patch.origin {
        task.origin = Some(v);
    }
    if let Some(v) = patch.status {
        task.status = v;
    }
    if let Some(v) = patch.started_at {
        task.started_at = Some(v);
    }
    if let Some(v) = patch.completed_at {
        task.completed_at = Some(v);
    }
    if let Some(v) = patch.metadata {
        task.metadata = Some(v);
    }
    task.check_timestamp_invariants().map_err(error::validation)?;

    conn.execute(
        "UPDATE tasks SET task_type = ?2, origin = ?3, status = ?4, started_at = ?5, completed_at = ?6, metadata = ?7
         WHERE id = ?1",
        params![
            task.id.to_string(),
            task.task_type,
            task.origin,
            task.status.as_str(),
            task.started_at,
            task.completed_at,
            task.metadata.as_ref().map(to_json).transpose()?,
        ],
    )?;
    Ok(task)
}

#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn list(conn: &Connection, filter: TaskFilter) -> Result<Vec<Task>> {
    let limit = filter.limit.unwrap_or(100);
    let offset = filter.offset.unwrap_or(0);
    let mut stmt;
    let rows = if let Some(status) = filter.status {
        stmt = conn.prepare(
            "SELECT id, input, task_type, origin, status, created_at, started_at, completed_at, metadata
             FROM tasks WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
        )?;
        stmt.query_map(params![status.as_str(), limit, offset], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        stmt = conn.prepare(
            "SELECT id, input, task_type, origin, status, created_at, started_at, completed_at, metadata
             FROM tasks ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        stmt.query_map(params![limit, offset], row_to_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    rows.into_iter().map(assemble).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn conn() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn create_get_round_trip() {
        let db = conn();
        let task = create(db.connection(), serde_json::json!({"q": 1}), None).unwrap();
        let fetched = get(db.connection(), task.id).unwrap();
        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[test]
    fn update_applies_partial_patch() {
        let db = conn();
        let task = create(db.connection(), serde_json::json!({}), None).unwrap();
        let updated = update(
            db.connection(),
            task.id,
            TaskUpdate {
                status: Some(TaskStatus::Running),
                started_at: Some(task.created_at + 5),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, TaskStatus::Running);
        assert_eq!(updated.started_at, Some(task.created_at + 5));
    }

    #[test]
    fn list_filters_by_status() {
        let db = conn();
        let a = create(db.connection(), serde_json::json!({}), None).unwrap();
        let _b = create(db.connection(), serde_json::json!({}), None).unwrap();
        update(
            db.connection(),
            a.id,
            TaskUpdate { status: Some(TaskStatus::Completed), ..Default::default() },
        )
        .unwrap();
        let completed = list(
            db.connection(),
            TaskFilter { status: Some(TaskStatus::Completed), ..Default::default() },
        )
        .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, a.id);
    }

    #[test]
    fn get_missing_task_is_not_found() {
        let db = conn();
        let err = get(db.connection(), TaskId::new()).unwrap_err();
        assert!(matches!(err, crate::error::Error::Domain(evotrace_types::Error::NotFound(_))));
    }
}
