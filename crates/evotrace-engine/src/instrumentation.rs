//! Scoped acquisition of a span around an arbitrary asynchronous operation,
//! with guaranteed release on every exit path.

use std::future::Future;
use std::sync::Arc;

use evotrace_types::{Attributes, StatusCode};
use serde_json::Value;

use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::tracker::{SpanTracker, StartSpanParams};

/// Either the tracker rejected the call (no active task/execution — a
/// caller-side precondition violation) or the wrapped operation itself
/// failed with `E`. The span is ended in both cases before this surfaces.
#[derive(Debug)]
pub enum WrapError<E> {
    Tracker(crate::error::Error),
    Operation(E),
}

impl<E: std::fmt::Display> std::fmt::Display for WrapError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WrapError::Tracker(err) => write!(f, "{}", err),
            WrapError::Operation(err) => write!(f, "{}", err),
        }
    }
}

impl<E: std::fmt::Display + std::fmt::Debug> std::error::Error for WrapError<E> {}

fn sampled_in(sample_rate: f64) -> bool {
    if sample_rate >= 1.0 {
        return true;
    }
    if sample_rate <= 0.0 {
        return false;
    }
    rand::random::<f64>() < sample_rate
}

fn count_args(input: &Value) -> i64 {
    match input {
        Value::Array(items) => items.len() as i64,
        Value::Object(map) => map.len() as i64,
        Value::Null => 0,
        _ => 1,
    }
}

/// `tracker` is borrowed for the lifetime of the wrap call rather than
/// stored, since a tracker is owned exclusively by its host.
pub struct Instrumentation {
    pub auto_tags: Vec<String>,
    pub sample_rate: f64,
    pub span_name: Option<String>,
    pub telemetry_sink: Option<Arc<dyn TelemetrySink>>,
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self { auto_tags: Vec::new(), sample_rate: 1.0, span_name: None, telemetry_sink: None }
    }
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.auto_tags = tags.into_iter().collect();
        self
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_span_name(mut self, name: impl Into<String>) -> Self {
        self.span_name = Some(name.into());
        self
    }

    pub fn with_telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry_sink = Some(sink);
        self
    }

    fn emit(&self, event: TelemetryEvent) {
        if let Some(sink) = &self.telemetry_sink {
            sink.emit(event);
        }
    }

    /// Wraps `op`, an async operation producing `Result<T, E>`.
    ///
    /// `fn_name` names the operation for the default span name and the
    /// `error.component` field. `extract_attributes` reads caller-supplied
    /// input attributes; `extract_output_attributes` reads attributes off a
    /// successful result. Both run only when sampling selects this call.
    pub async fn wrap<T, E, Fut, F, ExtractIn, ExtractOut>(
        &self,
        tracker: &mut SpanTracker,
        fn_name: &str,
        input: &Value,
        extract_attributes: ExtractIn,
        extract_output_attributes: ExtractOut,
        op: F,
    ) -> Result<T, WrapError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + std::fmt::Debug,
        ExtractIn: FnOnce(&Value) -> Attributes,
        ExtractOut: FnOnce(&T) -> Attributes,
    {
        if !sampled_in(self.sample_rate) {
            return op().await.map_err(WrapError::Operation);
        }

        let span_name = self
            .span_name
            .clone()
            .unwrap_or_else(|| if fn_name.is_empty() { "anonymous_function".to_string() } else { fn_name.to_string() });

        let mut attributes = extract_attributes(input);
        attributes.insert("function.name".to_string(), Value::String(span_name.clone()));
        attributes.insert("function.args_count".to_string(), Value::from(count_args(input)));

        let mut params = StartSpanParams::new(span_name);
        params.attributes = attributes;
        params.tags = self.auto_tags.clone();

        let handle = tracker.start_span(params).map_err(WrapError::Tracker)?;
        let start_ms = evotrace_core::now_ms();

        match op().await {
            Ok(value) => {
                let duration_ms = evotrace_core::now_ms() - start_ms;
                let mut out_attrs = extract_output_attributes(&value);
                out_attrs.insert("execution.success".to_string(), Value::Bool(true));
                out_attrs.insert("execution.duration_ms".to_string(), Value::from(duration_ms));
                let cost = out_attrs.get("execution.cost").and_then(Value::as_f64);
                if let Err(err) = tracker.set_attributes(handle, out_attrs) {
                    tracing::warn!(error = %err, "failed to stamp success attributes");
                }
                if let Err(err) = tracker.end_span(handle) {
                    tracing::warn!(error = %err, "failed to end span on success path");
                }
                self.emit(TelemetryEvent::AgentExecution {
                    agent_type: fn_name.to_string(),
                    success: true,
                    duration_ms,
                    cost,
                });
                Ok(value)
            }
            Err(err) => {
                let message = err.to_string();
                let sanitized = evotrace_core::sanitize_message(&message);
                let type_name = std::any::type_name::<E>();
                let category = evotrace_core::ErrorCategory::classify(type_name, &message);
                let stack_hash = Some(evotrace_core::hash_stack_trace(&format!("{:?}", err)));

                if let Err(e) = tracker.set_status(handle, StatusCode::Error, Some(sanitized.clone())) {
                    tracing::warn!(error = %e, "failed to set error status");
                }
                if let Err(e) = tracker.set_attribute(handle, "error.type", Value::String(type_name.to_string())) {
                    tracing::warn!(error = %e, "failed to set error.type");
                }
                if let Err(e) = tracker.set_attribute(handle, "error.message", Value::String(sanitized)) {
                    tracing::warn!(error = %e, "failed to set error.message");
                }
                if let Err(e) = tracker.end_span(handle) {
                    tracing::warn!(error = %e, "failed to end span on error path");
                }
                self.emit(TelemetryEvent::Error {
                    error_type: type_name.to_string(),
                    error_category: category.as_str(),
                    component: fn_name.to_string(),
                    stack_trace_hash: stack_hash,
                });
                Err(WrapError::Operation(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::SpanTracker;
    use evotrace_store::Store;
    use std::sync::Mutex;

    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl TelemetrySink for RecordingSink {
        fn emit(&self, event: TelemetryEvent) {
            let label = match event {
                TelemetryEvent::AgentExecution { .. } => "agent_execution",
                TelemetryEvent::Error { .. } => "error",
            };
            self.events.lock().unwrap().push(label.to_string());
        }
    }

    fn tracker() -> SpanTracker {
        let mut t = SpanTracker::new(Store::open_in_memory().unwrap());
        t.start_task(serde_json::json!({}), None).unwrap();
        t.start_execution(None).unwrap();
        t
    }

    #[tokio::test]
    async fn success_path_emits_agent_execution_event() {
        let mut t = tracker();
        let sink = Arc::new(RecordingSink { events: Mutex::new(Vec::new()) });
        let inst = Instrumentation::new().with_telemetry_sink(sink.clone());

        let result: Result<i32, String> = inst
            .wrap(&mut t, "do_work", &serde_json::json!({"x": 1}), |_| Attributes::new(), |_| Attributes::new(), || async {
                Ok(42)
            })
            .await
            .map_err(|e| e.to_string());

        assert_eq!(result.unwrap(), 42);
        assert_eq!(t.active_span_count(), 0);
        assert_eq!(sink.events.lock().unwrap().as_slice(), ["agent_execution"]);
    }

    #[tokio::test]
    async fn failure_path_sanitizes_message_and_never_stores_stack_text() {
        let mut t = tracker();
        let sink = Arc::new(RecordingSink { events: Mutex::new(Vec::new()) });
        let inst = Instrumentation::new().with_telemetry_sink(sink.clone());

        let result: Result<(), _> = inst
            .wrap(
                &mut t,
                "do_work",
                &serde_json::json!({}),
                |_| Attributes::new(),
                |_: &()| Attributes::new(),
                || async { Err::<(), _>("password=hunter2secret leaked".to_string()) },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(t.active_span_count(), 0);
        assert_eq!(sink.events.lock().unwrap().as_slice(), ["error"]);
    }

    #[tokio::test]
    async fn zero_sample_rate_skips_span_entirely() {
        let mut t = tracker();
        let inst = Instrumentation::new().with_sample_rate(0.0);
        let before = t.active_span_count();
        let result: Result<i32, String> = inst
            .wrap(&mut t, "do_work", &serde_json::json!({}), |_| Attributes::new(), |_| Attributes::new(), || async {
                Ok(1)
            })
            .await
            .map_err(|e| e.to_string());
        assert_eq!(result.unwrap(), 1);
        assert_eq!(t.active_span_count(), before);
    }
}
