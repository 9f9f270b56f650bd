use crate::ids::{ExecutionId, SpanId, TaskId, TraceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat string-keyed attribute bag. Values are JSON scalars/arrays, never
/// nested objects that would defeat the attribute-extraction contract.
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Internal,
    Client,
    Server,
    Producer,
    Consumer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Error,
    Unset,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Error => "ERROR",
            StatusCode::Unset => "UNSET",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanStatus {
    pub code: StatusCode,
    pub message: Option<String>,
}

impl Default for SpanStatus {
    fn default() -> Self {
        Self {
            code: StatusCode::Unset,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanLink {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub link_type: Option<String>,
    pub attributes: Option<Attributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: i64,
    pub attributes: Option<Attributes>,
}

/// Process/agent context a span was recorded under.
pub type Resource = Attributes;

/// An operation measurement following open-tracing conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub task_id: TaskId,
    pub execution_id: ExecutionId,
    pub name: String,
    pub kind: SpanKind,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub duration_ms: Option<i64>,
    pub status: SpanStatus,
    pub attributes: Attributes,
    pub resource: Resource,
    pub links: Option<Vec<SpanLink>>,
    pub tags: Option<Vec<String>>,
    pub events: Option<Vec<SpanEvent>>,
}

impl Span {
    /// `end_time >= start_time`; if `duration_ms` is present it equals
    /// `end_time - start_time`.
    pub fn check_timing_invariants(&self) -> Result<(), String> {
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(format!(
                    "end_time {} precedes start_time {}",
                    end, self.start_time
                ));
            }
            if let Some(dur) = self.duration_ms
                && dur != end - self.start_time
            {
                return Err(format!(
                    "duration_ms {} does not equal end_time - start_time ({})",
                    dur,
                    end - self.start_time
                ));
            }
        }
        Ok(())
    }
}
