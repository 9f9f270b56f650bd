//! Free-text corrective observations about a span, stored as sanitized,
//! zero-valued feedback rewards.

use evotrace_engine::SpanTracker;
use evotrace_store::Store;
use evotrace_types::{FeedbackType, Reward, SpanId};

use crate::error::Result;
use crate::link_manager::{LinkManager, RewardInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
}

pub struct FeedbackInput {
    pub comment: String,
    pub category: Option<String>,
    pub severity: Option<Severity>,
}

pub struct FeedbackCollector;

impl FeedbackCollector {
    /// Sanitizes `comment` through the same pipeline as error messages,
    /// then records it as a `feedback_type = user` reward with `value =
    /// 0.0` via `LinkManager::link_reward` — not a separate table.
    pub fn record_feedback(tracker: &mut SpanTracker, target_span_id: SpanId, input: FeedbackInput, now: i64) -> Result<Reward> {
        let sanitized = evotrace_core::sanitize_message(&input.comment);
        let mut feedback = sanitized;
        if let Some(category) = &input.category {
            feedback = format!("[{category}] {feedback}");
        }
        if let Some(severity) = input.severity {
            let tag = match severity {
                Severity::Low => "low",
                Severity::Medium => "medium",
                Severity::High => "high",
            };
            feedback = format!("{feedback} (severity: {tag})");
        }

        let reward = LinkManager::link_reward(
            tracker,
            target_span_id,
            RewardInput { value: 0.0, feedback: Some(feedback), feedback_type: Some(FeedbackType::User), dimensions: None, provided_by: None },
            now,
        )?;
        Ok(reward)
    }

    pub fn list_feedback(store: &Store, span_id: SpanId) -> Result<Vec<Reward>> {
        let mut rewards = store.get_rewards_for_span(span_id)?;
        rewards.retain(|r| r.feedback_type == Some(FeedbackType::User));
        rewards.sort_by_key(|r| r.provided_at);
        Ok(rewards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evotrace_engine::StartSpanParams;
    use evotrace_store::Store;
    use serde_json::json;

    fn tracker_with_span() -> (SpanTracker, SpanId) {
        let store = Store::open_in_memory().unwrap();
        let mut tracker = SpanTracker::new(store);
        tracker.start_task(json!({}), None).unwrap();
        tracker.start_execution(None).unwrap();
        let handle = tracker.start_span(StartSpanParams::new("tool.call")).unwrap();
        let span_id = handle.0;
        tracker.end_span(handle).unwrap();
        (tracker, span_id)
    }

    #[test]
    fn record_feedback_sanitizes_and_tags_category() {
        let (mut tracker, span_id) = tracker_with_span();
        let reward = FeedbackCollector::record_feedback(
            &mut tracker,
            span_id,
            FeedbackInput { comment: "used wrong tool".to_string(), category: Some("wrong_tool".to_string()), severity: Some(Severity::High) },
            10,
        )
        .unwrap();
        assert_eq!(reward.value, 0.0);
        assert_eq!(reward.feedback_type, Some(FeedbackType::User));
        let feedback = reward.feedback.unwrap();
        assert!(feedback.contains("wrong_tool"));
        assert!(feedback.contains("high"));
    }

    #[test]
    fn list_feedback_is_ordered_by_provided_at() {
        let (mut tracker, span_id) = tracker_with_span();
        FeedbackCollector::record_feedback(&mut tracker, span_id, FeedbackInput { comment: "second".to_string(), category: None, severity: None }, 20).unwrap();
        FeedbackCollector::record_feedback(&mut tracker, span_id, FeedbackInput { comment: "first".to_string(), category: None, severity: None }, 10).unwrap();
        let list = FeedbackCollector::list_feedback(tracker.store(), span_id).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].provided_at, 10);
    }
}
