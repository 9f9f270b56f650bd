use crate::ids::{ExecutionId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attempt of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub task_id: TaskId,
    /// 1-based, dense per task: attempts of one task form `{1..N}`.
    pub attempt_number: u32,
    pub agent_id: Option<String>,
    pub agent_type: Option<String>,
    pub status: ExecutionStatus,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl Execution {
    pub fn new(id: ExecutionId, task_id: TaskId, attempt_number: u32, started_at: i64) -> Self {
        Self {
            id,
            task_id,
            attempt_number,
            agent_id: None,
            agent_type: None,
            status: ExecutionStatus::Running,
            started_at,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}
