use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use evotrace_types::{Execution, ExecutionId, ExecutionStatus, TaskId};

use crate::error::{self, Result};
use crate::util::{now_ms, to_json};

fn status_from_db(s: &str) -> Result<ExecutionStatus> {
    match s {
        "running" => Ok(ExecutionStatus::Running),
        "completed" => Ok(ExecutionStatus::Completed),
        "failed" => Ok(ExecutionStatus::Failed),
        other => Err(error::validation(format!("unknown execution status '{other}'"))),
    }
}

type ExecutionRow = (
    String,
    String,
    u32,
    Option<String>,
    Option<String>,
    String,
    i64,
    Option<i64>,
    Option<String>,
    Option<String>,
);

fn row_to_execution(row: &Row) -> rusqlite::Result<ExecutionRow> {
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
        row.get(9)?,
    ))
}

fn assemble(
    (id, task_id, attempt_number, agent_id, agent_type, status, started_at, completed_at, result, error_msg): ExecutionRow,
) -> Result<Execution> {
    Ok(Execution {
        id: id.parse().map_err(|e| error::validation(format!("malformed execution id: {e}")))?,
        task_id: task_id.parse().map_err(|e| error::validation(format!("malformed task id: {e}")))?,
        attempt_number,
        agent_id,
        agent_type,
        status: status_from_db(&status)?,
        started_at,
        completed_at,
        result: result.map(|r| serde_json::from_str(&r).unwrap_or(Value::Null)),
        error: error_msg,
    })
}

/// Computes `attempt_number = count(executions by task) + 1` and inserts in
/// the same statement sequence, relying on the caller holding the single
/// writer lock (see evotrace-runtime) so the count-then-insert is atomic
/// from the perspective of any other writer.
pub fn create(conn: &Connection, task_id: TaskId, agent_id: Option<String>, agent_type: Option<String>) -> Result<Execution> {
    let existing: u32 = conn.query_row(
        "SELECT COUNT(*) FROM executions WHERE task_id = ?1",
        params![task_id.to_string()],
        |row| row.get(0),
    )?;
    let execution = Execution {
        id: ExecutionId::new(),
        task_id,
        attempt_number: existing + 1,
        agent_id,
        agent_type,
        status: ExecutionStatus::Running,
        started_at: now_ms(),
        completed_at: None,
        result: None,
        error: None,
    };
    conn.execute(
        "INSERT INTO executions (id, task_id, attempt_number, agent_id, agent_type, status, started_at, completed_at, result, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            execution.id.to_string(),
            execution.task_id.to_string(),
            execution.attempt_number,
            execution.agent_id,
            execution.agent_type,
            execution.status.as_str(),
            execution.started_at,
            execution.completed_at,
            execution.result.as_ref().map(to_json).transpose()?,
            execution.error,
        ],
    )?;
    Ok(execution)
}

pub fn get(conn: &Connection, id: ExecutionId) -> Result<Execution> {
    let row = conn
        .query_row(
            "SELECT id, task_id, attempt_number, agent_id, agent_type, status, started_at, completed_at, result, error
             FROM executions WHERE id = ?1",
            params![id.to_string()],
            row_to_execution,
        )
        .optional()?;
    match row {
        Some(row) => assemble(row),
        None => Err(error::not_found(format!("execution '{id}' not found"))),
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExecutionUpdate {
    pub status: Option<ExecutionStatus>,
    pub completed_at: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

pub fn update(conn: &Connection, id: ExecutionId, patch: ExecutionUpdate) -> Result<Execution> {
    let mut execution = get(conn, id)?;
    if let Some(v) = patch.status {
        execution.status = v;
    }
    if let Some(v) = patch.completed_at {
        execution.completed_at = Some(v);
    }
    if let Some(v) = patch.result {
        execution.result = Some(v);
    }
    if let Some(v) = patch.error {
        execution.error = Some(v);
    }
    conn.execute(
        "UPDATE executions SET status = ?2, completed_at = ?3, result = ?4, error = ?5 WHERE id = ?1",
        params![
            execution.id.to_string(),
            execution.status.as_str(),
            execution.completed_at,
            execution.result.as_ref().map(to_json).transpose()?,
            execution.error,
        ],
    )?;
    Ok(execution)
}

pub fn list(conn: &Connection, task_id: TaskId) -> Result<Vec<Execution>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, attempt_number, agent_id, agent_type, status, started_at, completed_at, result, error
         FROM executions WHERE task_id = ?1 ORDER BY attempt_number ASC",
    )?;
    let rows = stmt
        .query_map(params![task_id.to_string()], row_to_execution)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repo::tasks;

    #[test]
    fn attempt_number_is_dense_per_task() {
        let db = Database::open_in_memory().unwrap();
        let task = tasks::create(db.connection(), serde_json::json!({}), None).unwrap();
        let first = create(db.connection(), task.id, None, None).unwrap();
        let second = create(db.connection(), task.id, None, None).unwrap();
        assert_eq!(first.attempt_number, 1);
        assert_eq!(second.attempt_number, 2);
    }

    #[test]
    fn update_merges_terminal_state() {
        let db = Database::open_in_memory().unwrap();
        let task = tasks::create(db.connection(), serde_json::json!({}), None).unwrap();
        let execution = create(db.connection(), task.id, None, None).unwrap();
        let updated = update(
            db.connection(),
            execution.id,
            ExecutionUpdate {
                status: Some(ExecutionStatus::Completed),
                completed_at: Some(execution.started_at + 10),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, ExecutionStatus::Completed);
    }
}
