//! Deterministic A/B experiment assignment and analysis.

use std::collections::BTreeMap;

use evotrace_learning::{AbEngine, Analysis};
use evotrace_types::{AbExperiment, Assignment, ExperimentId};

use crate::error::Result;
use crate::support::run_store;

#[derive(Debug, Clone, Copy, Default)]
pub struct Experiments;

impl Experiments {
    pub async fn create(&self, experiment: AbExperiment) -> Result<()> {
        run_store(move |store| AbEngine::create(store, &experiment)).await
    }

    pub async fn start(&self, id: ExperimentId) -> Result<AbExperiment> {
        run_store(move |store| AbEngine::start(store, id)).await
    }

    /// Idempotent by `(experiment, subject)`.
    pub async fn assign(&self, experiment: AbExperiment, subject_id: String, now: i64) -> Result<Assignment> {
        run_store(move |store| AbEngine::assign(store, &experiment, &subject_id, now)).await
    }

    pub async fn record_metric(
        &self,
        experiment_id: ExperimentId,
        variant: String,
        subject_id: String,
        success_metric_value: f64,
        secondary: Option<BTreeMap<String, f64>>,
        now: i64,
    ) -> Result<()> {
        run_store(move |store| AbEngine::record_metric(store, experiment_id, &variant, &subject_id, success_metric_value, secondary, now)).await
    }

    pub async fn analyze(&self, experiment: AbExperiment) -> Result<Analysis> {
        run_store(move |store| AbEngine::analyze(store, &experiment)).await
    }
}
