use crate::ids::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One top-level user request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub input: Value,
    pub task_type: Option<String>,
    pub origin: Option<String>,
    pub status: TaskStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl Task {
    pub fn new(id: TaskId, input: Value, created_at: i64) -> Self {
        Self {
            id,
            input,
            task_type: None,
            origin: None,
            status: TaskStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            metadata: None,
        }
    }

    /// `started_at >= created_at`, `completed_at >= started_at` when present.
    pub fn check_timestamp_invariants(&self) -> Result<(), String> {
        if let Some(started) = self.started_at
            && started < self.created_at
        {
            return Err(format!(
                "started_at {} precedes created_at {}",
                started, self.created_at
            ));
        }
        if let Some(completed) = self.completed_at {
            let floor = self.started_at.unwrap_or(self.created_at);
            if completed < floor {
                return Err(format!("completed_at {} precedes started_at {}", completed, floor));
            }
        }
        Ok(())
    }
}
