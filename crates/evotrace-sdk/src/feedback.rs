//! Delayed rewards, free-text feedback, and cold-start bootstrap import.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use evotrace_learning::{BootstrapLoader, FeedbackCollector, FeedbackInput, ImportSummary, LinkManager, RewardInput};
use evotrace_types::{FeedbackType, Reward, Span, SpanId};

use crate::error::Result;
use crate::support::{run_store, run_tracker};

#[derive(Debug, Clone, Copy, Default)]
pub struct Feedback;

impl Feedback {
    /// Links a delayed reward to `operation_span_id`.
    pub async fn link_reward(
        &self,
        operation_span_id: SpanId,
        value: f64,
        dimensions: Option<BTreeMap<String, f64>>,
        provided_by: Option<String>,
        now: i64,
    ) -> Result<Reward> {
        let input = RewardInput { value, feedback: None, feedback_type: Some(FeedbackType::Automated), dimensions, provided_by };
        run_tracker(move |tracker| LinkManager::link_reward(tracker, operation_span_id, input, now)).await
    }

    /// Every span carrying a `reward_for_operation` link to `operation_span_id`.
    pub async fn rewards_for_operation(&self, operation_span_id: SpanId) -> Result<Vec<Span>> {
        run_store(move |store| LinkManager::query_rewards_for_operation(store, operation_span_id)).await
    }

    pub async fn get_rewards(&self, operation_span_id: SpanId) -> Result<Vec<Reward>> {
        run_store(move |store| LinkManager::get_rewards(store, operation_span_id)).await
    }

    /// Records a sanitized, free-text corrective observation about a span.
    pub async fn record(&self, target_span_id: SpanId, input: FeedbackInput, now: i64) -> Result<Reward> {
        run_tracker(move |tracker| FeedbackCollector::record_feedback(tracker, target_span_id, input, now)).await
    }

    pub async fn list(&self, span_id: SpanId) -> Result<Vec<Reward>> {
        run_store(move |store| FeedbackCollector::list_feedback(store, span_id)).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bootstrap;

impl Bootstrap {
    /// Imports a curated seed-pattern file for a cold-start agent. A no-op
    /// (not an error) once `existing_task_count` already clears the
    /// learning engine's own-history threshold.
    pub async fn import(
        &self,
        agent_type: String,
        registered_agent_ids: BTreeSet<String>,
        existing_task_count: u64,
        our_major_version: u32,
        bytes: Vec<u8>,
        now: i64,
    ) -> Result<ImportSummary> {
        run_store(move |store| BootstrapLoader::import(store, &agent_type, &registered_agent_ids, existing_task_count, our_major_version, &bytes, now))
            .await
    }
}
