//! The in-process tracing layer: `SpanTracker` owns task/execution/span
//! lifecycle against a [`evotrace_store::Store`]; `Instrumentation` wraps
//! arbitrary async operations in a span with guaranteed release and
//! sanitized error reporting.

mod error;
mod instrumentation;
mod object_mode;
mod telemetry;
mod tracker;

pub use error::{Error, Result};
pub use instrumentation::{Instrumentation, WrapError};
pub use object_mode::{Agent, ExecutionOutcome, InstrumentedAgent};
pub use telemetry::{TelemetryEvent, TelemetrySink, TracingTelemetrySink};
pub use tracker::{SpanHandle, SpanTracker, StartSpanParams};
