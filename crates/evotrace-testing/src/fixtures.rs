//! Synthetic data builders for crate test suites.
//!
//! Covers the three shapes tests in this workspace repeatedly need: a
//! flattened learning [`Metric`] row, a populated in-memory [`Store`], and a
//! bootstrap seed-pattern file in the JSON format [`BootstrapLoader`]
//! expects.

use evotrace_learning::Metric;
use evotrace_store::Store;
use evotrace_types::{SpanKind, SpanStatus, StatusCode, Task, TaskId, TaskStatus};
use serde_json::{Value, json};

/// Builds [`Metric`] rows for a single agent, alternating success/failure so
/// the resulting running success rate is deterministic and easy to assert on.
pub struct MetricFixture {
    agent_id: String,
    task_type: String,
    base_timestamp: i64,
}

impl MetricFixture {
    pub fn new(agent_id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self { agent_id: agent_id.into(), task_type: task_type.into(), base_timestamp: 1_700_000_000 }
    }

    pub fn with_base_timestamp(mut self, timestamp: i64) -> Self {
        self.base_timestamp = timestamp;
        self
    }

    /// `count` rows, the first `successes` of which succeed.
    pub fn rows(&self, count: usize, successes: usize) -> Vec<Metric> {
        (0..count)
            .map(|i| Metric {
                execution_id: format!("{}-exec-{i}", self.agent_id),
                agent_id: self.agent_id.clone(),
                task_type: self.task_type.clone(),
                success: i < successes,
                duration_ms: 500.0 + i as f64 * 10.0,
                cost: 0.01 + i as f64 * 0.001,
                quality_score: if i < successes { 0.9 } else { 0.3 },
                user_satisfaction: None,
                timestamp: self.base_timestamp + i as i64 * 60,
                metadata: None,
            })
            .collect()
    }
}

/// Creates an in-memory [`Store`] with a single completed task and execution,
/// returning the store alongside the IDs so callers can attach spans/rewards.
pub fn seeded_store() -> anyhow::Result<(Store, Task)> {
    let store = Store::open_in_memory()?;
    let task = store.create_task(json!({"prompt": "fixture task"}), None)?;
    store.update_task(task.id, evotrace_store::TaskUpdate { status: Some(TaskStatus::Running), ..Default::default() })?;
    Ok((store, task))
}

/// Writes a top-level span carrying the `execution.*` attributes
/// [`evotrace_engine::Instrumentation`] stamps in production, so a
/// store-backed metrics view can reconstruct a [`Metric`] from it.
pub fn record_execution_span(
    store: &Store,
    task_id: TaskId,
    agent_id: &str,
    agent_type: &str,
    success: bool,
    duration_ms: i64,
    now: i64,
) -> anyhow::Result<()> {
    let execution = store.create_execution(task_id, Some(agent_id.to_string()), Some(agent_type.to_string()))?;
    let mut attributes = evotrace_types::Attributes::new();
    attributes.insert("agent.id".into(), json!(agent_id));
    attributes.insert("agent.type".into(), json!(agent_type));
    attributes.insert("execution.success".into(), json!(success));
    attributes.insert("execution.cost".into(), json!(0.02));
    attributes.insert("execution.quality_score".into(), json!(if success { 0.85 } else { 0.2 }));

    let span = evotrace_types::Span {
        trace_id: Default::default(),
        span_id: Default::default(),
        parent_span_id: None,
        task_id,
        execution_id: execution.id,
        name: format!("{agent_type}.call"),
        kind: SpanKind::Internal,
        start_time: now,
        end_time: Some(now + duration_ms),
        duration_ms: Some(duration_ms),
        status: SpanStatus { code: if success { StatusCode::Ok } else { StatusCode::Error }, message: None },
        attributes,
        resource: evotrace_types::Attributes::new(),
        links: None,
        tags: None,
        events: None,
    };
    store.record_span(&span)?;
    Ok(())
}

/// A minimal, schema-valid bootstrap file body for `BootstrapLoader::import`,
/// with one pattern per `task_type` in `task_types`.
pub fn bootstrap_file_json(task_types: &[&str]) -> Vec<u8> {
    let patterns: Vec<Value> = task_types
        .iter()
        .enumerate()
        .map(|(i, task_type)| {
            json!({
                "id": format!("seed-{i}"),
                "type": "prompt_refinement",
                "name": format!("seed pattern {i}"),
                "description": "fixture seed pattern",
                "sequence": ["step-a", "step-b"],
                "confidence": 0.6,
                "observationCount": 20,
                "successCount": 15,
                "successRate": 0.75,
                "taskType": task_type,
                "conditions": null,
                "action": {
                    "type": "adjust_prompt",
                    "parameters": null,
                },
            })
        })
        .collect();

    serde_json::to_vec(&json!({
        "version": "1.0.0",
        "description": "fixture bootstrap file",
        "patterns": patterns,
    }))
    .expect("fixture bootstrap file serializes")
}
