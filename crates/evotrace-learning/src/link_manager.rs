//! Attaches delayed rewards to their originating operation span.

use evotrace_engine::{SpanTracker, StartSpanParams};
use evotrace_store::Store;
use evotrace_types::{FeedbackType, Reward, RewardId, Span, SpanId};
use std::collections::BTreeMap;

use crate::error::{self, Result};

pub struct RewardInput {
    pub value: f64,
    pub feedback: Option<String>,
    pub feedback_type: Option<FeedbackType>,
    pub dimensions: Option<BTreeMap<String, f64>>,
    pub provided_by: Option<String>,
}

pub struct LinkManager;

impl LinkManager {
    /// Opens a short `evolution.reward` span linked to `operation_span_id`
    /// via a `reward_for_operation` link, ends it, and records the reward
    /// row. The task/execution the operation span belongs to must still be
    /// active on `tracker`.
    pub fn link_reward(tracker: &mut SpanTracker, operation_span_id: SpanId, input: RewardInput, now: i64) -> Result<Reward> {
        let reward = Reward {
            id: RewardId::new(),
            operation_span_id,
            value: input.value,
            dimensions: input.dimensions,
            feedback: input.feedback,
            feedback_type: input.feedback_type,
            provided_by: input.provided_by,
            provided_at: now,
            metadata: None,
        };
        reward.check_finite().map_err(error::validation)?;

        let operation_trace = tracker.store().get_span(operation_span_id)?.trace_id;
        let link = evotrace_types::SpanLink {
            trace_id: operation_trace,
            span_id: operation_span_id,
            link_type: Some("reward_for_operation".to_string()),
            attributes: None,
        };
        let handle = tracker.start_span(StartSpanParams {
            name: "evolution.reward".to_string(),
            kind: None,
            attributes: Default::default(),
            tags: vec![],
            links: vec![link],
            parent_span: None,
        })?;
        tracker.end_span(handle)?;

        tracker.store().record_reward(&reward)?;
        Ok(reward)
    }

    /// Every span carrying a `reward_for_operation` link that targets
    /// `operation_span_id`.
    pub fn query_rewards_for_operation(store: &Store, operation_span_id: SpanId) -> Result<Vec<Span>> {
        let trace_id = store.get_span(operation_span_id)?.trace_id;
        let spans = store.query_spans_by_trace(trace_id)?;
        Ok(spans
            .into_iter()
            .filter(|span| {
                span.links
                    .as_ref()
                    .is_some_and(|links| links.iter().any(|l| l.link_type.as_deref() == Some("reward_for_operation") && l.span_id == operation_span_id))
            })
            .collect())
    }

    pub fn get_rewards(store: &Store, operation_span_id: SpanId) -> Result<Vec<Reward>> {
        Ok(store.get_rewards_for_span(operation_span_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evotrace_engine::SpanTracker;
    use evotrace_store::Store;
    use serde_json::json;

    fn tracker_with_span() -> (SpanTracker, SpanId) {
        let store = Store::open_in_memory().unwrap();
        let mut tracker = SpanTracker::new(store);
        tracker.start_task(json!({}), None).unwrap();
        tracker.start_execution(None).unwrap();
        let handle = tracker
            .start_span(StartSpanParams { name: "tool.call".to_string(), kind: None, attributes: Default::default(), tags: vec![], links: vec![], parent_span: None })
            .unwrap();
        let span_id = handle.0;
        tracker.end_span(handle).unwrap();
        (tracker, span_id)
    }

    #[test]
    fn link_reward_records_row_and_linked_span() {
        let (mut tracker, operation_span_id) = tracker_with_span();
        let reward = LinkManager::link_reward(
            &mut tracker,
            operation_span_id,
            RewardInput { value: 0.9, feedback: Some("great".to_string()), feedback_type: None, dimensions: None, provided_by: Some("user".to_string()) },
            1000,
        )
        .unwrap();
        assert_eq!(reward.operation_span_id, operation_span_id);

        let rewards = LinkManager::get_rewards(tracker.store(), operation_span_id).unwrap();
        assert_eq!(rewards.len(), 1);

        let linked = LinkManager::query_rewards_for_operation(tracker.store(), operation_span_id).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].name, "evolution.reward");
    }

    #[test]
    fn link_reward_rejects_non_finite_value() {
        let (mut tracker, operation_span_id) = tracker_with_span();
        let result = LinkManager::link_reward(
            &mut tracker,
            operation_span_id,
            RewardInput { value: f64::NAN, feedback: None, feedback_type: None, dimensions: None, provided_by: None },
            1000,
        );
        assert!(result.is_err());
    }
}
