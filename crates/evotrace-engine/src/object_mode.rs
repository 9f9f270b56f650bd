//! Idiomatic stand-in for reflective "object-mode" instrumentation (wrapping
//! every non-underscore, non-constructor method of an object), which has no
//! direct Rust analogue. Here the same three guarantees — `agent.id`/`agent.type` stamped on
//! every span, `execution.quality_score`/`execution.cost` auto-extracted
//! from results — are expressed as two small traits plus a thin wrapper
//! that forwards to [`Instrumentation::wrap`].

use std::fmt::{Debug, Display};
use std::future::Future;

use evotrace_types::Attributes;
use serde_json::Value;

use crate::instrumentation::{Instrumentation, WrapError};
use crate::tracker::SpanTracker;

/// Implemented by agent types whose methods are run through
/// [`InstrumentedAgent::call`].
pub trait Agent {
    fn agent_id(&self) -> &str;
    fn agent_type(&self) -> &str;
}

/// Implemented by an operation's result type to expose the fields
/// auto-extracted onto the execution span. All default to absent.
pub trait ExecutionOutcome {
    fn quality_score(&self) -> Option<f64> {
        None
    }
    fn cost(&self) -> Option<f64> {
        None
    }
}

/// Binds an [`Agent`] to an [`Instrumentation`] config; every call through
/// `call()` is the Rust equivalent of an intercepted method invocation.
pub struct InstrumentedAgent<'a, A> {
    agent: &'a A,
    instrumentation: Instrumentation,
}

impl<'a, A: Agent> InstrumentedAgent<'a, A> {
    pub fn new(agent: &'a A, instrumentation: Instrumentation) -> Self {
        Self { agent, instrumentation }
    }

    pub async fn call<T, E, Fut, F>(
        &self,
        tracker: &mut SpanTracker,
        method_name: &str,
        input: &Value,
        op: F,
    ) -> Result<T, WrapError<E>>
    where
        T: ExecutionOutcome,
        E: Display + Debug,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let agent_id = self.agent.agent_id().to_string();
        let agent_type = self.agent.agent_type().to_string();

        self.instrumentation
            .wrap(
                tracker,
                method_name,
                input,
                move |_input| {
                    let mut attrs = Attributes::new();
                    attrs.insert("agent.id".to_string(), Value::String(agent_id.clone()));
                    attrs.insert("agent.type".to_string(), Value::String(agent_type.clone()));
                    attrs
                },
                |output: &T| {
                    let mut attrs = Attributes::new();
                    if let Some(quality) = output.quality_score() {
                        attrs.insert("execution.quality_score".to_string(), Value::from(quality));
                    }
                    if let Some(cost) = output.cost() {
                        attrs.insert("execution.cost".to_string(), Value::from(cost));
                    }
                    attrs
                },
                op,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evotrace_store::Store;

    struct Worker;

    impl Agent for Worker {
        fn agent_id(&self) -> &str {
            "worker-1"
        }
        fn agent_type(&self) -> &str {
            "Worker"
        }
    }

    struct Outcome {
        quality: f64,
    }

    impl ExecutionOutcome for Outcome {
        fn quality_score(&self) -> Option<f64> {
            Some(self.quality)
        }
    }

    #[tokio::test]
    async fn call_stamps_agent_identity_and_quality_score() {
        let mut tracker = SpanTracker::new(Store::open_in_memory().unwrap());
        tracker.start_task(serde_json::json!({}), None).unwrap();
        tracker.start_execution(None).unwrap();

        let worker = Worker;
        let instrumented = InstrumentedAgent::new(&worker, Instrumentation::new());
        let result = instrumented
            .call(&mut tracker, "run", &serde_json::json!({}), || async { Ok::<_, String>(Outcome { quality: 0.9 }) })
            .await;

        assert!(result.is_ok());
        assert_eq!(tracker.active_span_count(), 0);
    }
}
