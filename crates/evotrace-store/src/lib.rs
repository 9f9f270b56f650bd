//! Durable, schema-versioned, concurrency-safe persistence for the evotrace
//! telemetry and learning engine.
//!
//! [`Store`] is a thin façade over [`db::Database`] and the `repo::*`
//! modules; it owns no concurrency policy of its own — evotrace-runtime
//! wraps it in a `tokio::sync::Mutex` and drives every call through
//! `spawn_blocking` since `rusqlite::Connection` is synchronous.

mod db;
pub mod error;
pub mod export;
mod migrations;
pub mod repo;
mod util;

use std::path::Path;

pub use db::{Database, OpenOptions};
pub use error::{Error, Result};

use evotrace_types::{
    Adaptation, AdaptationId, AbExperiment, Assignment, EvolutionStats, Execution, ExecutionId, ExperimentId,
    ExperimentStatus, Metric, Pattern, PatternId, Reward, Span, SpanId, Task, TaskId, TraceId,
};

pub use repo::adaptations::AdaptationFilter;
pub use repo::executions::ExecutionUpdate;
pub use repo::patterns::PatternFilter;
pub use repo::spans::{SpanFilter, TagMode, MAX_BATCH_SIZE};
pub use repo::stats::SkillRecommendation;
pub use repo::tasks::{TaskFilter, TaskUpdate};

/// Owns a single database handle and routes typed operations to the
/// specialized `repo::*` modules.
pub struct Store {
    db: Database,
}

impl Store {
    pub fn open(path: &Path, options: OpenOptions) -> Result<Self> {
        Ok(Self { db: Database::open(path, options)? })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { db: Database::open_in_memory()? })
    }

    fn conn(&self) -> &rusqlite::Connection {
        self.db.connection()
    }

    fn conn_mut(&mut self) -> &mut rusqlite::Connection {
        self.db.connection_mut()
    }

    // -- Task -----------------------------------------------------------

    pub fn create_task(&self, input: serde_json::Value, metadata: Option<serde_json::Value>) -> Result<Task> {
        repo::tasks::create(self.conn(), input, metadata)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Task> {
        repo::tasks::get(self.conn(), id)
    }

    pub fn update_task(&self, id: TaskId, patch: TaskUpdate) -> Result<Task> {
        repo::tasks::update(self.conn(), id, patch)
    }

    pub fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        repo::tasks::list(self.conn(), filter)
    }

    // -- Execution --------------------------------------------------------

    pub fn create_execution(&self, task_id: TaskId, agent_id: Option<String>, agent_type: Option<String>) -> Result<Execution> {
        repo::executions::create(self.conn(), task_id, agent_id, agent_type)
    }

    pub fn get_execution(&self, id: ExecutionId) -> Result<Execution> {
        repo::executions::get(self.conn(), id)
    }

    pub fn update_execution(&self, id: ExecutionId, patch: ExecutionUpdate) -> Result<Execution> {
        repo::executions::update(self.conn(), id, patch)
    }

    pub fn list_executions(&self, task_id: TaskId) -> Result<Vec<Execution>> {
        repo::executions::list(self.conn(), task_id)
    }

    // -- Span ------------------------------------------------------------

    pub fn record_span(&self, span: &Span) -> Result<()> {
        repo::spans::record(self.conn(), span)
    }

    pub fn record_span_batch(&mut self, spans: &[Span]) -> Result<()> {
        repo::spans::record_batch(self.conn_mut(), spans)
    }

    pub fn get_span(&self, span_id: SpanId) -> Result<Span> {
        repo::spans::get(self.conn(), span_id)
    }

    pub fn query_spans_by_trace(&self, trace_id: TraceId) -> Result<Vec<Span>> {
        repo::spans::query_spans_by_trace(self.conn(), trace_id)
    }

    pub fn query_children(&self, parent_span_id: SpanId) -> Result<Vec<Span>> {
        repo::spans::query_children(self.conn(), parent_span_id)
    }

    pub fn query_spans(&self, filter: SpanFilter) -> Result<Vec<Span>> {
        repo::spans::query(self.conn(), filter)
    }

    pub fn query_linked_spans(&self, span_id: SpanId) -> Result<Vec<Span>> {
        repo::spans::query_linked_spans(self.conn(), span_id)
    }

    pub fn query_spans_by_tags(&self, tags: &[String], mode: TagMode) -> Result<Vec<Span>> {
        repo::spans::query_by_tags(self.conn(), tags, mode)
    }

    // -- Pattern -----------------------------------------------------------

    pub fn record_pattern(&self, pattern: &Pattern) -> Result<()> {
        repo::patterns::record(self.conn(), pattern)
    }

    pub fn get_pattern(&self, id: PatternId) -> Result<Pattern> {
        repo::patterns::get(self.conn(), id)
    }

    pub fn query_patterns(&self, filter: PatternFilter) -> Result<Vec<Pattern>> {
        repo::patterns::query(self.conn(), filter)
    }

    pub fn update_pattern(&self, id: PatternId, confidence: f64, occurrences: u64, last_observed: i64, running_success_rate: f64) -> Result<Pattern> {
        repo::patterns::update(self.conn(), id, confidence, occurrences, last_observed, running_success_rate)
    }

    pub fn deactivate_pattern(&self, id: PatternId) -> Result<Pattern> {
        repo::patterns::deactivate(self.conn(), id)
    }

    pub fn get_active_patterns(&self, agent_type: Option<&str>, task_type: Option<&str>, skill: Option<&str>) -> Result<Vec<Pattern>> {
        repo::patterns::get_active(self.conn(), agent_type, task_type, skill)
    }

    pub fn trim_patterns_to_limit(&self, agent_type: &str, max_patterns: u64) -> Result<u64> {
        repo::patterns::trim_to_limit(self.conn(), agent_type, max_patterns)
    }

    // -- Adaptation --------------------------------------------------------

    pub fn record_adaptation(&self, adaptation: &Adaptation) -> Result<()> {
        repo::adaptations::record(self.conn(), adaptation)
    }

    pub fn get_adaptation(&self, id: AdaptationId) -> Result<Adaptation> {
        repo::adaptations::get(self.conn(), id)
    }

    pub fn query_adaptations(&self, filter: AdaptationFilter) -> Result<Vec<Adaptation>> {
        repo::adaptations::query(self.conn(), filter)
    }

    pub fn update_adaptation_outcome(&self, id: AdaptationId, success: bool, improvement: Option<f64>) -> Result<Adaptation> {
        repo::adaptations::update_outcome(self.conn(), id, success, improvement)
    }

    pub fn deactivate_adaptation(&self, id: AdaptationId, at: i64, reason: &str) -> Result<Adaptation> {
        repo::adaptations::deactivate(self.conn(), id, at, reason)
    }

    // -- Reward ------------------------------------------------------------

    pub fn record_reward(&self, reward: &Reward) -> Result<()> {
        repo::rewards::record(self.conn(), reward)
    }

    pub fn get_rewards_for_span(&self, span_id: SpanId) -> Result<Vec<Reward>> {
        repo::rewards::get_for_span(self.conn(), span_id)
    }

    pub fn query_rewards_by_operation_span(&self, span_id: SpanId) -> Result<Vec<Reward>> {
        repo::rewards::query_by_operation_span(self.conn(), span_id)
    }

    pub fn query_rewards(&self, filter: repo::rewards::RewardFilter) -> Result<Vec<Reward>> {
        repo::rewards::query(self.conn(), filter)
    }

    // -- Stats ---------------------------------------------------------------

    pub fn get_stats(&self, agent_id: &str, window_start: i64, window_end: i64) -> Result<EvolutionStats> {
        repo::stats::get_stats(self.conn(), agent_id, window_start, window_end)
    }

    pub fn get_skill_performance(&self, skill: &str) -> Result<evotrace_types::SkillPerformanceCache> {
        repo::stats::get_skill_performance(self.conn(), skill)
    }

    pub fn get_skill_recommendations(&self, task_type: &str, agent_type: Option<&str>, top_n: usize) -> Result<Vec<SkillRecommendation>> {
        repo::stats::get_skill_recommendations(self.conn(), task_type, agent_type, top_n)
    }

    // -- A/B ------------------------------------------------------------------

    pub fn create_experiment(&self, experiment: &AbExperiment) -> Result<()> {
        repo::ab::create_experiment(self.conn(), experiment)
    }

    pub fn get_experiment(&self, id: ExperimentId) -> Result<AbExperiment> {
        repo::ab::get_experiment(self.conn(), id)
    }

    pub fn set_experiment_status(&self, id: ExperimentId, status: ExperimentStatus) -> Result<AbExperiment> {
        repo::ab::set_status(self.conn(), id, status)
    }

    pub fn get_assignment(&self, experiment_id: ExperimentId, subject_id: &str) -> Result<Option<Assignment>> {
        repo::ab::get_assignment(self.conn(), experiment_id, subject_id)
    }

    pub fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        repo::ab::insert_assignment(self.conn(), assignment)
    }

    pub fn record_metric(&self, metric: &Metric) -> Result<()> {
        repo::ab::record_metric(self.conn(), metric)
    }

    pub fn metric_values(&self, experiment_id: ExperimentId, variant: &str) -> Result<Vec<f64>> {
        repo::ab::metric_values(self.conn(), experiment_id, variant)
    }

    // -- Export -----------------------------------------------------------

    pub fn export_json(&self, filter: export::ExportFilter) -> Result<String> {
        export::export_json(self.conn(), filter)
    }

    pub fn export_csv(&self, filter: export::ExportFilter) -> Result<String> {
        export::export_csv(self.conn(), filter)
    }
}
