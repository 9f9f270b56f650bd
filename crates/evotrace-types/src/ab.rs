use crate::ids::ExperimentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbExperiment {
    pub id: ExperimentId,
    pub name: String,
    pub variants: Vec<String>,
    pub traffic_split: Vec<f64>,
    pub success_metric: String,
    pub min_sample_size: u64,
    pub significance_level: f64,
    pub status: ExperimentStatus,
    pub created_at: i64,
}

impl AbExperiment {
    /// `len(variants) == len(traffic_split)` and split sums to 1 within 1e-3.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.variants.len() != self.traffic_split.len() {
            return Err(format!(
                "variants ({}) and traffic_split ({}) length mismatch",
                self.variants.len(),
                self.traffic_split.len()
            ));
        }
        if self.variants.is_empty() {
            return Err("experiment must declare at least one variant".to_string());
        }
        let sum: f64 = self.traffic_split.iter().sum();
        if (sum - 1.0).abs() > 1e-3 {
            return Err(format!("traffic_split sums to {}, expected ~1.0", sum));
        }
        Ok(())
    }
}

/// Uniquely identified by `(experiment_id, subject_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub experiment_id: ExperimentId,
    pub subject_id: String,
    pub variant: String,
    pub assigned_at: i64,
}

/// Append-only per-variant metric observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub experiment_id: ExperimentId,
    pub variant: String,
    pub subject_id: String,
    pub success_metric_value: f64,
    pub secondary: Option<std::collections::BTreeMap<String, f64>>,
    pub recorded_at: i64,
}
