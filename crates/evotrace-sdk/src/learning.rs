//! Pattern mining, bounded storage, and recommendation — driven by
//! per-agent-type thresholds from the [`EvolutionCatalog`].

use evotrace_learning::{EvolutionCatalog, LearningConfig, LearningEngine, MetricsView};
use evotrace_types::{Complexity, Pattern, PatternId};

use crate::error::Result;
use crate::metrics::StoreMetricsView;
use crate::support::run_store;

/// Learning-related operations, scoped to one agent type's catalog entry.
pub struct Learning<'a> {
    pub(crate) catalog: &'a EvolutionCatalog,
}

impl<'a> Learning<'a> {
    /// Mines the store's own spans (via [`StoreMetricsView`]) for
    /// `agent_id`/`agent_type`, persists the resulting patterns, and trims
    /// the agent's set back to its catalog-configured cap.
    pub async fn extract_and_store(&self, agent_id: String, agent_type: String) -> Result<Vec<Pattern>> {
        let config = LearningConfig::from(&self.catalog.get(&agent_type));
        run_store(move |store| {
            let engine = LearningEngine::new(config);
            let view = StoreMetricsView::new(store);
            let patterns = engine.extract_patterns(&view, &agent_id);
            engine.store_patterns(store, &agent_id, &patterns)?;
            Ok(patterns)
        })
        .await
    }

    /// Power-user escape hatch for callers with their own [`MetricsView`]
    /// (e.g. metrics assembled outside this store, or in tests).
    pub async fn extract_and_store_from(&self, agent_id: String, agent_type: String, view: &dyn MetricsView) -> Result<Vec<Pattern>> {
        let config = LearningConfig::from(&self.catalog.get(&agent_type));
        let engine = LearningEngine::new(config);
        let patterns = engine.extract_patterns(view, &agent_id);
        let to_store = patterns.clone();
        run_store(move |store| {
            engine.store_patterns(store, &agent_id, &to_store)?;
            Ok(())
        })
        .await?;
        Ok(patterns)
    }

    /// Folds in one validated observation against an already-stored pattern.
    pub async fn record_outcome(&self, pattern_id: PatternId, success: bool, now: i64) -> Result<Pattern> {
        let config = LearningConfig::default();
        let engine = LearningEngine::new(config);
        run_store(move |store| engine.apply_update(store, pattern_id, success, now)).await
    }

    /// The active patterns matching `(agent_type, task_type, complexity)`,
    /// ranked by `confidence * running_success_rate` descending.
    pub async fn recommend(&self, agent_type: String, task_type: String, complexity: Option<Complexity>) -> Result<Vec<Pattern>> {
        let config = LearningConfig::from(&self.catalog.get(&agent_type));
        let engine = LearningEngine::new(config);
        run_store(move |store| engine.recommend(store, &agent_type, &task_type, complexity)).await
    }
}
