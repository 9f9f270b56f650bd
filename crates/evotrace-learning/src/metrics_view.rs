//! The input `LearningEngine` mines over: a per-agent list of flattened
//! execution observations. Kept separate from `evotrace_store`'s
//! own `Span`/`Reward` rows so the engine can be driven by a store-backed
//! view in production or a synthetic view in tests.

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Metric {
    pub execution_id: String,
    pub agent_id: String,
    pub task_type: String,
    pub success: bool,
    pub duration_ms: f64,
    pub cost: f64,
    pub quality_score: f64,
    pub user_satisfaction: Option<f64>,
    pub timestamp: i64,
    pub metadata: Option<Value>,
}

/// Supplies `LearningEngine::extract_patterns` with an agent's history.
/// `evotrace-sdk` implements this over `Store::query_spans` joined with
/// `Store::query_rewards`; tests implement it directly over a `Vec<Metric>`.
pub trait MetricsView {
    fn metrics(&self, agent_id: &str) -> Vec<Metric>;
}

pub struct InMemoryMetricsView {
    rows: Vec<Metric>,
}

impl InMemoryMetricsView {
    pub fn new(rows: Vec<Metric>) -> Self {
        Self { rows }
    }
}

impl MetricsView for InMemoryMetricsView {
    fn metrics(&self, agent_id: &str) -> Vec<Metric> {
        self.rows.iter().filter(|m| m.agent_id == agent_id).cloned().collect()
    }
}
