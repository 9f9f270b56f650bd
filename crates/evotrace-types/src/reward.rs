use crate::ids::{RewardId, SpanId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    User,
    Automated,
    Expert,
}

/// Delayed feedback attached to an operation span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub operation_span_id: SpanId,
    /// Finite real; negatives permitted as penalties.
    pub value: f64,
    pub dimensions: Option<BTreeMap<String, f64>>,
    pub feedback: Option<String>,
    pub feedback_type: Option<FeedbackType>,
    pub provided_by: Option<String>,
    pub provided_at: i64,
    pub metadata: Option<Value>,
}

impl Reward {
    /// `value` and every dimension value must be finite.
    pub fn check_finite(&self) -> Result<(), String> {
        if !self.value.is_finite() {
            return Err(format!("reward value {} is not finite", self.value));
        }
        if let Some(dims) = &self.dimensions {
            for (name, v) in dims {
                if !v.is_finite() {
                    return Err(format!("reward dimension '{}' value {} is not finite", name, v));
                }
            }
        }
        Ok(())
    }
}
