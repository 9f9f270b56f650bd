use crate::ids::{AdaptationId, PatternId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationType {
    Config,
    Prompt,
    Strategy,
    Resource,
    Skill,
}

/// A derived configuration change applied to future executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adaptation {
    pub id: AdaptationId,
    pub pattern_id: PatternId,
    #[serde(rename = "type")]
    pub adaptation_type: AdaptationType,
    pub before_config: Value,
    pub after_config: Value,
    pub applied_to_agent_id: Option<String>,
    pub applied_to_task_type: Option<String>,
    pub applied_to_skill: Option<String>,
    pub applied_at: i64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_improvement: f64,
    pub is_active: bool,
    pub deactivated_at: Option<i64>,
    pub deactivation_reason: Option<String>,
}

impl Adaptation {
    /// Maintains a running average improvement and success/failure counters.
    pub fn record_outcome(&mut self, success: bool, improvement: Option<f64>) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        if let Some(delta) = improvement {
            let n = (self.success_count + self.failure_count) as f64;
            self.avg_improvement += (delta - self.avg_improvement) / n;
        }
    }

    pub fn deactivate(&mut self, at: i64, reason: impl Into<String>) {
        self.is_active = false;
        self.deactivated_at = Some(at);
        self.deactivation_reason = Some(reason.into());
    }
}
