//! The in-process tracing root: at most one active task, at most one active
//! execution within it, and a map of in-flight spans keyed by `span_id`.

use std::collections::BTreeMap;

use evotrace_store::{ExecutionUpdate, Store, TaskUpdate};
use evotrace_types::{
    Attributes, ExecutionId, ExecutionStatus, Span, SpanEvent, SpanId, SpanKind, SpanLink, SpanStatus, StatusCode,
    Task, TaskId, TaskStatus, TraceId,
};
use serde_json::Value;

use crate::error::{self, Result};

/// Parameters accepted by [`SpanTracker::start_span`].
#[derive(Debug, Default, Clone)]
pub struct StartSpanParams {
    pub name: String,
    pub kind: Option<SpanKind>,
    pub attributes: Attributes,
    pub tags: Vec<String>,
    pub links: Vec<SpanLink>,
    pub parent_span: Option<SpanId>,
}

impl StartSpanParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }
}

struct CurrentTask {
    id: TaskId,
}

struct CurrentExecution {
    id: ExecutionId,
    attempt_number: u32,
}

/// A handle into [`SpanTracker::active_spans`]; cheap to copy and pass
/// around, carries no borrow of the tracker itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanHandle(pub SpanId);

/// An in-flight span: everything a [`Span`] needs except `end_time` and
/// `duration_ms`, which are only known at `end()`.
struct ActiveSpan {
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    task_id: TaskId,
    execution_id: ExecutionId,
    name: String,
    kind: SpanKind,
    start_time: i64,
    status: SpanStatus,
    attributes: Attributes,
    links: Vec<SpanLink>,
    tags: Vec<String>,
    events: Vec<SpanEvent>,
    ended: bool,
}

/// The in-process tracing root. Owned exclusively by one host;
/// not `Sync` — concurrent hosts each hold their own tracker, or a single
/// shared instance is serialized upstream (see `evotrace-runtime`).
pub struct SpanTracker {
    store: Store,
    agent_id: Option<String>,
    agent_type: Option<String>,
    current_task: Option<CurrentTask>,
    current_execution: Option<CurrentExecution>,
    active_spans: BTreeMap<SpanId, ActiveSpan>,
}

impl SpanTracker {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            agent_id: None,
            agent_type: None,
            current_task: None,
            current_execution: None,
            active_spans: BTreeMap::new(),
        }
    }

    /// Attaches the identity stamped onto every span's `resource` map.
    pub fn with_agent(mut self, agent_id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self.agent_type = Some(agent_type.into());
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn current_task_id(&self) -> Option<TaskId> {
        self.current_task.as_ref().map(|t| t.id)
    }

    pub fn current_execution_id(&self) -> Option<ExecutionId> {
        self.current_execution.as_ref().map(|e| e.id)
    }

    pub fn active_span_count(&self) -> usize {
        self.active_spans.len()
    }

    // -- Lifecycle --------------------------------------------------------

    pub fn start_task(&mut self, input: Value, metadata: Option<Value>) -> Result<Task> {
        if self.current_task.is_some() {
            return Err(error::state("a task is already active on this tracker"));
        }
        let task = self.store.create_task(input, metadata)?;
        let now = evotrace_core::now_ms();
        let task = self.store.update_task(
            task.id,
            TaskUpdate { status: Some(TaskStatus::Running), started_at: Some(now), ..Default::default() },
        )?;
        self.current_task = Some(CurrentTask { id: task.id });
        tracing::debug!(task_id = %task.id, "task started");
        Ok(task)
    }

    pub fn start_execution(&mut self, _metadata: Option<Value>) -> Result<ExecutionId> {
        let task_id = self.current_task.as_ref().map(|t| t.id).ok_or_else(|| error::state("no active task"))?;
        let execution = self.store.create_execution(task_id, self.agent_id.clone(), self.agent_type.clone())?;
        self.current_execution = Some(CurrentExecution { id: execution.id, attempt_number: execution.attempt_number });
        tracing::debug!(execution_id = %execution.id, attempt = execution.attempt_number, "execution started");
        Ok(execution.id)
    }

    pub fn start_span(&mut self, params: StartSpanParams) -> Result<SpanHandle> {
        let task_id = self.current_task.as_ref().map(|t| t.id).ok_or_else(|| error::state("no active task"))?;
        let execution_id =
            self.current_execution.as_ref().map(|e| e.id).ok_or_else(|| error::state("no active execution"))?;

        let span_id = SpanId::new();
        let trace_id = match params.parent_span {
            Some(parent) => self
                .active_spans
                .get(&parent)
                .map(|s| s.trace_id)
                .ok_or_else(|| error::state(format!("parent span '{parent}' is not active")))?,
            None => TraceId::new(),
        };

        let mut attributes = params.attributes;
        attributes.insert("task.id".to_string(), Value::String(task_id.to_string()));
        attributes.insert("execution.id".to_string(), Value::String(execution_id.to_string()));
        if let Some(attempt) = self.current_execution.as_ref().map(|e| e.attempt_number) {
            attributes.insert("execution.attempt".to_string(), Value::from(attempt));
        }

        let active = ActiveSpan {
            trace_id,
            span_id,
            parent_span_id: params.parent_span,
            task_id,
            execution_id,
            name: params.name,
            kind: params.kind.unwrap_or(SpanKind::Internal),
            start_time: evotrace_core::now_ms(),
            status: SpanStatus { code: StatusCode::Unset, message: None },
            attributes,
            links: params.links,
            tags: params.tags,
            events: Vec::new(),
            ended: false,
        };
        self.active_spans.insert(span_id, active);
        Ok(SpanHandle(span_id))
    }

    fn require_active(&mut self, handle: SpanHandle) -> Result<&mut ActiveSpan> {
        self.active_spans
            .get_mut(&handle.0)
            .filter(|s| !s.ended)
            .ok_or_else(|| error::state(format!("span '{}' is not active", handle.0)))
    }

    pub fn set_status(&mut self, handle: SpanHandle, code: StatusCode, message: Option<String>) -> Result<()> {
        let span = self.require_active(handle)?;
        span.status = SpanStatus { code, message };
        Ok(())
    }

    pub fn set_attribute(&mut self, handle: SpanHandle, key: impl Into<String>, value: Value) -> Result<()> {
        let span = self.require_active(handle)?;
        span.attributes.insert(key.into(), value);
        Ok(())
    }

    pub fn set_attributes(&mut self, handle: SpanHandle, attrs: Attributes) -> Result<()> {
        let span = self.require_active(handle)?;
        span.attributes.extend(attrs);
        Ok(())
    }

    pub fn add_tags(&mut self, handle: SpanHandle, tags: impl IntoIterator<Item = String>) -> Result<()> {
        let span = self.require_active(handle)?;
        span.tags.extend(tags);
        Ok(())
    }

    pub fn add_event(&mut self, handle: SpanHandle, event: SpanEvent) -> Result<()> {
        let span = self.require_active(handle)?;
        span.events.push(event);
        Ok(())
    }

    pub fn add_link(&mut self, handle: SpanHandle, link: SpanLink) -> Result<()> {
        let span = self.require_active(handle)?;
        span.links.push(link);
        Ok(())
    }

    /// Single-shot: a second call on an already-ended handle is a no-op.
    /// A span that never had [`Self::set_status`] called defaults to `OK`.
    pub fn end_span(&mut self, handle: SpanHandle) -> Result<()> {
        self.end_span_with_default(handle, StatusCode::Ok)
    }

    /// Like [`Self::end_span`], but `default_code` is used in place of `OK`
    /// when the span's status is still `UNSET` — used by [`Self::end_task`]
    /// to mark stray spans force-ended under an aborted/failed task as
    /// `ERROR` rather than `OK`.
    fn end_span_with_default(&mut self, handle: SpanHandle, default_code: StatusCode) -> Result<()> {
        let Some(active) = self.active_spans.get_mut(&handle.0) else {
            return Ok(());
        };
        if active.ended {
            return Ok(());
        }
        if active.status.code == StatusCode::Unset {
            active.status = SpanStatus { code: default_code, message: None };
        }
        active.ended = true;
        let end_time = evotrace_core::now_ms();
        let span = Span {
            trace_id: active.trace_id,
            span_id: active.span_id,
            parent_span_id: active.parent_span_id,
            task_id: active.task_id,
            execution_id: active.execution_id,
            name: active.name.clone(),
            kind: active.kind,
            start_time: active.start_time,
            end_time: Some(end_time),
            duration_ms: Some(end_time - active.start_time),
            status: active.status.clone(),
            attributes: active.attributes.clone(),
            resource: evotrace_types::Resource::default(),
            links: if active.links.is_empty() { None } else { Some(active.links.clone()) },
            tags: if active.tags.is_empty() { None } else { Some(active.tags.clone()) },
            events: if active.events.is_empty() { None } else { Some(active.events.clone()) },
        };
        span.check_timing_invariants().map_err(error::state)?;
        self.store.record_span(&span)?;
        self.active_spans.remove(&handle.0);
        Ok(())
    }

    pub fn end_execution(&mut self, result: Option<Value>, error: Option<String>) -> Result<()> {
        let current = self.current_execution.take().ok_or_else(|| error::state("no active execution"))?;
        let status = if error.is_some() { ExecutionStatus::Failed } else { ExecutionStatus::Completed };
        self.store.update_execution(
            current.id,
            ExecutionUpdate { status: Some(status), completed_at: Some(evotrace_core::now_ms()), result, error },
        )?;
        Ok(())
    }

    /// Force-ends every active span, updates the task to `status`, and
    /// clears both `currentTask`/`currentExecution` so a crashed or aborted
    /// task never leaks an open span.
    pub fn end_task(&mut self, status: TaskStatus) -> Result<Task> {
        let current = self.current_task.take().ok_or_else(|| error::state("no active task"))?;
        let stray_default = if status == TaskStatus::Failed { StatusCode::Error } else { StatusCode::Ok };
        let stray: Vec<SpanHandle> = self.active_spans.keys().copied().map(SpanHandle).collect();
        for handle in stray {
            if let Err(err) = self.end_span_with_default(handle, stray_default) {
                tracing::warn!(span_id = %handle.0, error = %err, "failed to force-end span during endTask");
            }
        }
        self.current_execution = None;
        let task = self.store.update_task(
            current.id,
            TaskUpdate { status: Some(status), completed_at: Some(evotrace_core::now_ms()), ..Default::default() },
        )?;
        tracing::debug!(task_id = %task.id, status = ?status, "task ended");
        Ok(task)
    }

    /// Idempotent full reset for long-lived hosts recycling the tracker
    /// between logical sessions. Does not touch the underlying store.
    pub fn cleanup(&mut self) {
        self.active_spans.clear();
        self.current_task = None;
        self.current_execution = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SpanTracker {
        SpanTracker::new(Store::open_in_memory().unwrap()).with_agent("agent-1", "worker")
    }

    #[test]
    fn start_task_twice_is_rejected() {
        let mut t = tracker();
        t.start_task(serde_json::json!({}), None).unwrap();
        let err = t.start_task(serde_json::json!({}), None).unwrap_err();
        assert!(matches!(err, crate::error::Error::Domain(_)));
    }

    #[test]
    fn span_without_execution_is_rejected() {
        let mut t = tracker();
        t.start_task(serde_json::json!({}), None).unwrap();
        let err = t.start_span(StartSpanParams::new("step")).unwrap_err();
        assert!(err.to_string().contains("no active execution"));
    }

    #[test]
    fn end_span_is_single_shot() {
        let mut t = tracker();
        t.start_task(serde_json::json!({}), None).unwrap();
        t.start_execution(None).unwrap();
        let handle = t.start_span(StartSpanParams::new("step")).unwrap();
        t.end_span(handle).unwrap();
        // second end is a no-op, not an error
        t.end_span(handle).unwrap();
        assert_eq!(t.active_span_count(), 0);
    }

    #[test]
    fn end_task_force_ends_stray_spans_and_clears_state() {
        let mut t = tracker();
        t.start_task(serde_json::json!({}), None).unwrap();
        t.start_execution(None).unwrap();
        let a = t.start_span(StartSpanParams::new("a")).unwrap();
        let b = t.start_span(StartSpanParams::new("b")).unwrap();
        t.set_status(a, StatusCode::Error, Some("boom".to_string())).unwrap();
        assert_eq!(t.active_span_count(), 2);

        t.end_task(TaskStatus::Completed).unwrap();

        assert_eq!(t.active_span_count(), 0);
        assert!(t.current_task_id().is_none());
        assert!(t.current_execution_id().is_none());

        // `a` kept its explicit status; the stray `b` span never had
        // `set_status` called and must not persist as `UNSET` (testable
        // property 1: every ended span has a non-unset status).
        let spans = t.store.query_spans(evotrace_store::SpanFilter::new()).unwrap();
        let span_a = spans.iter().find(|s| s.span_id == a.0).unwrap();
        let span_b = spans.iter().find(|s| s.span_id == b.0).unwrap();
        assert_eq!(span_a.status.code, StatusCode::Error);
        assert_eq!(span_b.status.code, StatusCode::Ok);
        assert!(spans.iter().all(|s| s.status.code != StatusCode::Unset));
    }

    #[test]
    fn end_task_force_ends_stray_spans_as_error_when_task_failed() {
        let mut t = tracker();
        t.start_task(serde_json::json!({}), None).unwrap();
        t.start_execution(None).unwrap();
        let stray = t.start_span(StartSpanParams::new("crashed")).unwrap();

        t.end_task(TaskStatus::Failed).unwrap();

        let spans = t.store.query_spans(evotrace_store::SpanFilter::new()).unwrap();
        let span = spans.iter().find(|s| s.span_id == stray.0).unwrap();
        assert_eq!(span.status.code, StatusCode::Error);
    }

    #[test]
    fn nested_span_inherits_trace_id() {
        let mut t = tracker();
        t.start_task(serde_json::json!({}), None).unwrap();
        t.start_execution(None).unwrap();
        let parent = t.start_span(StartSpanParams::new("parent")).unwrap();
        let mut child_params = StartSpanParams::new("child");
        child_params.parent_span = Some(parent.0);
        let child = t.start_span(child_params).unwrap();

        let parent_trace = t.active_spans.get(&parent.0).unwrap().trace_id;
        let child_trace = t.active_spans.get(&child.0).unwrap().trace_id;
        assert_eq!(parent_trace, child_trace);
    }

    #[test]
    fn cleanup_resets_state_without_touching_store() {
        let mut t = tracker();
        t.start_task(serde_json::json!({}), None).unwrap();
        t.start_execution(None).unwrap();
        t.start_span(StartSpanParams::new("a")).unwrap();
        t.cleanup();
        assert_eq!(t.active_span_count(), 0);
        assert!(t.current_task_id().is_none());
    }
}
