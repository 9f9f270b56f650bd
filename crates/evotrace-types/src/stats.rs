use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl PeriodType {
    /// <=2h hourly, <=48h daily, <=168h weekly, else monthly.
    pub fn from_window_hours(hours: f64) -> Self {
        if hours <= 2.0 {
            PeriodType::Hourly
        } else if hours <= 48.0 {
            PeriodType::Daily
        } else if hours <= 168.0 {
            PeriodType::Weekly
        } else {
            PeriodType::Monthly
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillSummary {
    pub skill: String,
    pub uses: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    pub agent_id: String,
    pub period_type: PeriodType,
    pub window_start: i64,
    pub window_end: i64,
    pub total_executions: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub avg_cost: f64,
    pub avg_quality: f64,
    pub patterns_in_window: u64,
    pub adaptations_in_window: u64,
    pub improvement_rate_vs_prior: Option<f64>,
    pub per_skill: Vec<SkillSummary>,
}

/// One row per skill name, eagerly maintained by a trigger on span insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillPerformanceCache {
    pub skill: String,
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub mean_duration_ms: f64,
    pub last_updated: i64,
}

impl SkillPerformanceCache {
    pub fn empty(skill: impl Into<String>, now: i64) -> Self {
        Self {
            skill: skill.into(),
            total: 0,
            successes: 0,
            failures: 0,
            success_rate: 0.0,
            mean_duration_ms: 0.0,
            last_updated: now,
        }
    }

    /// Incorporates one new observation, keeping the running mean exact
    /// (Welford-style incremental mean, no need to replay history).
    pub fn record_observation(&mut self, succeeded: bool, duration_ms: f64, now: i64) {
        self.total += 1;
        if succeeded {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.mean_duration_ms += (duration_ms - self.mean_duration_ms) / self.total as f64;
        self.success_rate = self.successes as f64 / self.total as f64;
        self.last_updated = now;
    }
}
