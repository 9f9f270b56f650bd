use crate::ids::{PatternId, SpanId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Success,
    AntiPattern,
    Optimization,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Success => "success",
            PatternType::AntiPattern => "anti_pattern",
            PatternType::Optimization => "optimization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// low if mean duration < 5s, medium if < 15s, else high.
    pub fn from_mean_duration_ms(mean_ms: f64) -> Self {
        if mean_ms < 5_000.0 {
            Complexity::Low
        } else if mean_ms < 15_000.0 {
            Complexity::Medium
        } else {
            Complexity::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEvidence {
    pub sample_size: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternData {
    pub conditions: Value,
    pub recommendations: Value,
    pub expected_improvement: Option<f64>,
    pub evidence: PatternEvidence,
}

/// A learned generalization over historical metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub confidence: f64,
    pub occurrences: u64,
    pub pattern_data: PatternData,
    pub source_span_ids: Vec<SpanId>,
    pub applies_to_agent_type: Option<String>,
    pub applies_to_task_type: Option<String>,
    pub applies_to_skill: Option<String>,
    pub first_observed: i64,
    pub last_observed: i64,
    pub is_active: bool,
    pub complexity: Option<Complexity>,
    pub config_keys: Option<Vec<String>>,
    pub context_metadata: Option<Value>,
    /// Group-level success rate captured at creation time, fixed for the
    /// pattern's lifetime. `LearningEngine::update_pattern` maintains a
    /// separate pattern-local running rate on top of this fixed value.
    pub group_success_rate: f64,
    /// Pattern-local running success rate, updated by `update_pattern`.
    pub running_success_rate: f64,
}

impl Pattern {
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.source_span_ids.is_empty() {
            return Err("pattern must carry at least one source span".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} out of [0,1]", self.confidence));
        }
        if self.occurrences < 1 {
            return Err("occurrences must be >= 1".to_string());
        }
        if self.last_observed < self.first_observed {
            return Err("last_observed precedes first_observed".to_string());
        }
        Ok(())
    }
}
