//! Deterministic, repeatable experiment assignment and Welch's-t-test
//! analysis.

use std::collections::BTreeMap;

use evotrace_store::Store;
use evotrace_types::{AbExperiment, Assignment, ExperimentId, ExperimentStatus, Metric};
use sha2::{Digest, Sha256};

use crate::error::{self, Result};
use crate::stats_math::{mean, stddev, two_sided_p_value, welch_t_test};

pub struct AbEngine;

#[derive(Debug, Clone)]
pub struct VariantStats {
    pub variant: String,
    pub n: usize,
    pub mean: f64,
    pub stddev: f64,
    pub confidence_interval_95: (f64, f64),
}

#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Significant { winner: String, p_value: f64, effect_size: f64 },
    NoSignificantDifference { p_value: f64 },
    InsufficientData,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub variants: Vec<VariantStats>,
    pub outcome: AnalysisOutcome,
}

fn stable_hash_unit_interval(experiment: &str, subject: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(experiment.as_bytes());
    hasher.update(b":");
    hasher.update(subject.as_bytes());
    let digest = hasher.finalize();
    let leading = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (leading % 100_000) as f64 / 100_000.0
}

fn pick_variant(experiment: &AbExperiment, draw: f64) -> String {
    let mut cumulative = 0.0;
    for (variant, split) in experiment.variants.iter().zip(&experiment.traffic_split) {
        cumulative += split;
        if draw < cumulative {
            return variant.clone();
        }
    }
    experiment.variants.last().cloned().unwrap_or_default()
}

impl AbEngine {
    pub fn create(store: &Store, experiment: &AbExperiment) -> Result<()> {
        experiment.check_invariants().map_err(error::validation)?;
        store.create_experiment(experiment)?;
        Ok(())
    }

    pub fn start(store: &Store, id: ExperimentId) -> Result<AbExperiment> {
        Ok(store.set_experiment_status(id, ExperimentStatus::Running)?)
    }

    /// Idempotent by `(experiment, subject)`: a stored assignment is
    /// returned unchanged, otherwise the subject is hashed into `[0,1)` and
    /// mapped onto the cumulative traffic split.
    pub fn assign(store: &Store, experiment: &AbExperiment, subject_id: &str, now: i64) -> Result<Assignment> {
        if let Some(existing) = store.get_assignment(experiment.id, subject_id)? {
            return Ok(existing);
        }
        let draw = stable_hash_unit_interval(&experiment.id.to_string(), subject_id);
        let variant = pick_variant(experiment, draw);
        let assignment = Assignment { experiment_id: experiment.id, subject_id: subject_id.to_string(), variant, assigned_at: now };
        store.insert_assignment(&assignment)?;
        store.get_assignment(experiment.id, subject_id)?.ok_or_else(|| error::state("assignment vanished after insert"))
    }

    pub fn record_metric(
        store: &Store,
        experiment_id: ExperimentId,
        variant: &str,
        subject_id: &str,
        success_metric_value: f64,
        secondary: Option<BTreeMap<String, f64>>,
        now: i64,
    ) -> Result<()> {
        let metric = Metric {
            experiment_id,
            variant: variant.to_string(),
            subject_id: subject_id.to_string(),
            success_metric_value,
            secondary,
            recorded_at: now,
        };
        store.record_metric(&metric)?;
        Ok(())
    }

    pub fn analyze(store: &Store, experiment: &AbExperiment) -> Result<Analysis> {
        let mut per_variant = Vec::new();
        for variant in &experiment.variants {
            let values = store.metric_values(experiment.id, variant)?;
            let m = mean(&values);
            let sd = stddev(&values);
            let se = if values.len() > 1 { sd / (values.len() as f64).sqrt() } else { 0.0 };
            per_variant.push((variant.clone(), values, VariantStats {
                variant: variant.clone(),
                n: 0,
                mean: m,
                stddev: sd,
                confidence_interval_95: (m - 1.96 * se, m + 1.96 * se),
            }));
        }
        let variants: Vec<VariantStats> = per_variant
            .iter()
            .map(|(_, values, stats)| VariantStats { n: values.len(), ..stats.clone() })
            .collect();

        if experiment.variants.len() != 2 {
            return Ok(Analysis { variants, outcome: AnalysisOutcome::InsufficientData });
        }

        let (_, a_values, a_stats) = &per_variant[0];
        let (_, b_values, b_stats) = &per_variant[1];
        let min_sample = experiment.min_sample_size as usize;
        if a_values.len() < min_sample || b_values.len() < min_sample {
            return Ok(Analysis { variants, outcome: AnalysisOutcome::InsufficientData });
        }

        let outcome = match welch_t_test(a_values, b_values) {
            Some((t, df)) => {
                let p = two_sided_p_value(t, df);
                if p < experiment.significance_level {
                    let winner = if a_stats.mean >= b_stats.mean { a_stats.variant.clone() } else { b_stats.variant.clone() };
                    let effect_size = (a_stats.mean - b_stats.mean).abs();
                    AnalysisOutcome::Significant { winner, p_value: p, effect_size }
                } else {
                    AnalysisOutcome::NoSignificantDifference { p_value: p }
                }
            }
            None => AnalysisOutcome::InsufficientData,
        };
        Ok(Analysis { variants, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiment() -> AbExperiment {
        AbExperiment {
            id: ExperimentId::new(),
            name: "prompt-v2".to_string(),
            variants: vec!["control".to_string(), "treatment".to_string()],
            traffic_split: vec![0.5, 0.5],
            success_metric: "quality".to_string(),
            min_sample_size: 5,
            significance_level: 0.05,
            status: ExperimentStatus::Draft,
            created_at: 0,
        }
    }

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn assign_is_idempotent() {
        let store = store();
        let exp = experiment();
        AbEngine::create(&store, &exp).unwrap();
        let first = AbEngine::assign(&store, &exp, "user-1", 0).unwrap();
        let second = AbEngine::assign(&store, &exp, "user-1", 0).unwrap();
        assert_eq!(first.variant, second.variant);
    }

    #[test]
    fn assign_respects_traffic_split_tail() {
        let store = store();
        let mut exp = experiment();
        exp.traffic_split = vec![1.0, 0.0];
        AbEngine::create(&store, &exp).unwrap();
        for i in 0..20 {
            let assignment = AbEngine::assign(&store, &exp, &format!("user-{i}"), 0).unwrap();
            assert_eq!(assignment.variant, "control");
        }
    }

    #[test]
    fn analyze_reports_insufficient_data_below_min_sample_size() {
        let store = store();
        let exp = experiment();
        AbEngine::create(&store, &exp).unwrap();
        AbEngine::record_metric(&store, exp.id, "control", "u1", 0.5, None, 0).unwrap();
        let analysis = AbEngine::analyze(&store, &exp).unwrap();
        assert!(matches!(analysis.outcome, AnalysisOutcome::InsufficientData));
    }

    #[test]
    fn analyze_declares_winner_on_clear_separation() {
        let store = store();
        let exp = experiment();
        AbEngine::create(&store, &exp).unwrap();
        for (i, v) in [0.9, 0.91, 0.89, 0.92, 0.88].iter().enumerate() {
            AbEngine::record_metric(&store, exp.id, "control", &format!("c{i}"), *v, None, 0).unwrap();
        }
        for (i, v) in [0.1, 0.11, 0.09, 0.12, 0.08].iter().enumerate() {
            AbEngine::record_metric(&store, exp.id, "treatment", &format!("t{i}"), *v, None, 0).unwrap();
        }
        let analysis = AbEngine::analyze(&store, &exp).unwrap();
        match analysis.outcome {
            AnalysisOutcome::Significant { winner, .. } => assert_eq!(winner, "control"),
            other => panic!("expected significant outcome, got {other:?}"),
        }
    }
}
