//! Task/execution/span lifecycle against the global tracker, ergonomically
//! async: every call hops onto a blocking thread internally so the caller
//! never has to think about `SpanTracker`'s synchronous store access.

use evotrace_engine::{SpanHandle, StartSpanParams};
use evotrace_types::{Attributes, SpanEvent, SpanLink, StatusCode, Task, TaskStatus};
use serde_json::Value;

use crate::error::Result;

/// Handle into the process-global `SpanTracker`. Cheap to construct; all
/// state lives behind `evotrace-runtime`'s global tracker cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracking;

impl Tracking {
    pub async fn start_task(&self, input: Value, metadata: Option<Value>) -> Result<Task> {
        Ok(evotrace_runtime::with_tracker(move |t| t.start_task(input, metadata)).await?)
    }

    pub async fn start_execution(&self, metadata: Option<Value>) -> Result<evotrace_types::ExecutionId> {
        Ok(evotrace_runtime::with_tracker(move |t| t.start_execution(metadata)).await?)
    }

    pub async fn start_span(&self, params: StartSpanParams) -> Result<SpanHandle> {
        Ok(evotrace_runtime::with_tracker(move |t| t.start_span(params)).await?)
    }

    pub async fn set_status(&self, handle: SpanHandle, code: StatusCode, message: Option<String>) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| t.set_status(handle, code, message)).await?)
    }

    pub async fn set_attributes(&self, handle: SpanHandle, attrs: Attributes) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| t.set_attributes(handle, attrs)).await?)
    }

    pub async fn add_tags(&self, handle: SpanHandle, tags: Vec<String>) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| t.add_tags(handle, tags)).await?)
    }

    pub async fn add_event(&self, handle: SpanHandle, event: SpanEvent) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| t.add_event(handle, event)).await?)
    }

    pub async fn add_link(&self, handle: SpanHandle, link: SpanLink) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| t.add_link(handle, link)).await?)
    }

    pub async fn end_span(&self, handle: SpanHandle) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| t.end_span(handle)).await?)
    }

    pub async fn end_execution(&self, result: Option<Value>, error: Option<String>) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| t.end_execution(result, error)).await?)
    }

    pub async fn end_task(&self, status: TaskStatus) -> Result<Task> {
        Ok(evotrace_runtime::with_tracker(move |t| t.end_task(status)).await?)
    }

    pub async fn cleanup(&self) -> Result<()> {
        Ok(evotrace_runtime::with_tracker(move |t| {
            t.cleanup();
            Ok(())
        })
        .await?)
    }

    pub async fn active_span_count(&self) -> Result<usize> {
        Ok(evotrace_runtime::with_tracker(move |t| Ok(t.active_span_count())).await?)
    }
}
