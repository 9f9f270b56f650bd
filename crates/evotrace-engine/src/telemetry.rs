//! The telemetry events `Instrumentation` emits alongside spans. These never
//! carry payloads, messages, or stack traces — only the small, fixed fields
//! the contract enumerates.

/// Emitted after a wrapped operation completes, success or failure.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    AgentExecution { agent_type: String, success: bool, duration_ms: i64, cost: Option<f64> },
    Error { error_type: String, error_category: &'static str, component: String, stack_trace_hash: Option<String> },
}

/// A sink a host wires to its own metrics/logging pipeline. The default
/// implementation just logs at `debug`, since the library itself has no
/// opinion about where telemetry ultimately goes.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

/// Forwards every event to `tracing`, at `debug` level, structured.
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::AgentExecution { agent_type, success, duration_ms, cost } => {
                tracing::debug!(agent_type, success, duration_ms, cost, "agent_execution");
            }
            TelemetryEvent::Error { error_type, error_category, component, stack_trace_hash } => {
                tracing::debug!(error_type, error_category, component, stack_trace_hash, "error");
            }
        }
    }
}
