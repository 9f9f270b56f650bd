use evotrace_learning::EvolutionCatalog;
use evotrace_runtime::RuntimeConfig;

use crate::error::Result;
use crate::experiments::Experiments;
use crate::feedback::{Bootstrap, Feedback};
use crate::learning::Learning;
use crate::tracking::Tracking;

/// Entry point for host applications: owns the evolution catalog and hands
/// out thin, stateless handles onto the process-global tracker.
pub struct Client {
    catalog: EvolutionCatalog,
}

impl Client {
    /// Opens (or creates) the file-backed store at `config.storage_path`
    /// and installs it as the process-global tracker. Loads
    /// `config.catalog_path` if set, otherwise starts with all-default
    /// evolution parameters.
    pub async fn connect(config: RuntimeConfig) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => EvolutionCatalog::load_from(path)?,
            None => EvolutionCatalog::empty(),
        };
        evotrace_runtime::init(&config, None, None).await?;
        Ok(Self { catalog })
    }

    /// [`Self::connect`] with settings resolved from `EVOTRACE_*` environment variables.
    pub async fn connect_default() -> Result<Self> {
        let config = RuntimeConfig::from_env()?;
        Self::connect(config).await
    }

    /// An ephemeral in-memory store, for tests and short-lived tools.
    pub async fn connect_in_memory() -> Result<Self> {
        evotrace_runtime::init_in_memory(None, None).await?;
        Ok(Self { catalog: EvolutionCatalog::empty() })
    }

    pub fn tracking(&self) -> Tracking {
        Tracking
    }

    pub fn learning(&self) -> Learning<'_> {
        Learning { catalog: &self.catalog }
    }

    pub fn experiments(&self) -> Experiments {
        Experiments
    }

    pub fn feedback(&self) -> Feedback {
        Feedback
    }

    pub fn bootstrap(&self) -> Bootstrap {
        Bootstrap
    }

    pub fn catalog(&self) -> &EvolutionCatalog {
        &self.catalog
    }

    /// Clears the global tracker. Does not delete the underlying store file.
    pub async fn shutdown(&self) {
        evotrace_runtime::teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use evotrace_engine::StartSpanParams;
    use evotrace_learning::InMemoryMetricsView;
    use evotrace_testing::fixtures::{bootstrap_file_json, MetricFixture};
    use evotrace_types::{ExperimentStatus, StatusCode, TaskStatus};
    use serde_json::json;

    use super::*;

    fn draft_experiment() -> evotrace_types::AbExperiment {
        evotrace_types::AbExperiment {
            id: evotrace_types::ExperimentId::new(),
            name: "prompt-v2".to_string(),
            variants: vec!["control".to_string(), "treatment".to_string()],
            traffic_split: vec![0.5, 0.5],
            success_metric: "success".to_string(),
            min_sample_size: 2,
            significance_level: 0.05,
            status: ExperimentStatus::Draft,
            created_at: 0,
        }
    }

    // The global tracker is process-wide state shared by every test in this
    // binary, so every case below runs sequentially inside one test to avoid
    // cross-test races (mirrors evotrace-runtime's own global_tracker tests).
    #[tokio::test]
    async fn client_lifecycle() {
        // Task/execution/span lifecycle, including nested spans.
        let client = Client::connect_in_memory().await.unwrap();
        let tracking = client.tracking();

        let task = tracking.start_task(json!({"prompt": "hello"}), None).await.unwrap();
        tracking.start_execution(None).await.unwrap();

        let outer = tracking.start_span(StartSpanParams::new("outer")).await.unwrap();
        let inner =
            tracking.start_span(StartSpanParams { parent_span: Some(outer.0), ..StartSpanParams::new("inner") }).await.unwrap();
        assert_eq!(tracking.active_span_count().await.unwrap(), 2);

        tracking.set_status(inner, StatusCode::Ok, None).await.unwrap();
        tracking.end_span(inner).await.unwrap();
        tracking.end_span(outer).await.unwrap();
        assert_eq!(tracking.active_span_count().await.unwrap(), 0);

        tracking.end_execution(Some(json!({"ok": true})), None).await.unwrap();
        let completed = tracking.end_task(TaskStatus::Completed).await.unwrap();
        assert_eq!(completed.id, task.id);
        assert_eq!(completed.status, TaskStatus::Completed);

        // Catalog defaults.
        assert!(client.catalog().get("any-agent-type").max_patterns_per_agent > 0);

        // Feedback: delayed reward linked to an operation span.
        client.tracking().start_task(json!({"prompt": "review this PR"}), None).await.unwrap();
        client.tracking().start_execution(None).await.unwrap();
        let operation = client.tracking().start_span(StartSpanParams::new("review.call")).await.unwrap();
        client.tracking().end_span(operation).await.unwrap();

        let reward = client.feedback().link_reward(operation.0, 0.9, None, Some("user".to_string()), 0).await.unwrap();
        assert_eq!(reward.operation_span_id, operation.0);
        assert_eq!(client.feedback().get_rewards(operation.0).await.unwrap().len(), 1);
        assert_eq!(client.feedback().rewards_for_operation(operation.0).await.unwrap().len(), 1);

        // Bootstrap import is a no-op once the agent already has history.
        let bytes = bootstrap_file_json(&["review"]);
        let summary =
            client.bootstrap().import("code-reviewer".to_string(), Default::default(), 50, 1, bytes, 0).await.unwrap();
        assert!(summary.no_op);

        // Pattern mining: `extract_patterns` stamps `applies_to_agent_type`
        // with the `agent_id` it was called with, so `recommend` must be
        // queried with that same string as its `agent_type` argument.
        let learning = client.learning();
        let rows = MetricFixture::new("summarizer", "summarize").rows(30, 27);
        let view = InMemoryMetricsView::new(rows);
        let patterns =
            learning.extract_and_store_from("summarizer".to_string(), "summarizer".to_string(), &view).await.unwrap();
        assert!(!patterns.is_empty());
        let recommended = learning.recommend("summarizer".to_string(), "summarize".to_string(), None).await.unwrap();
        assert!(!recommended.is_empty());

        // A/B experiments: create, start, assign, record.
        let experiments = client.experiments();
        let experiment = draft_experiment();
        experiments.create(experiment.clone()).await.unwrap();
        let running = experiments.start(experiment.id).await.unwrap();
        assert_eq!(running.status, ExperimentStatus::Running);
        let assignment = experiments.assign(running.clone(), "subject-1".to_string(), 0).await.unwrap();
        assert!(running.variants.contains(&assignment.variant));
        experiments
            .record_metric(running.id, assignment.variant.clone(), "subject-1".to_string(), 1.0, None, 1)
            .await
            .unwrap();

        client.shutdown().await;

        // A file-backed store persists across a fresh connect.
        let dir = tempfile::TempDir::new().unwrap();
        let config = RuntimeConfig {
            storage_path: dir.path().to_path_buf(),
            db_busy_timeout_ms: 5000,
            wal: true,
            sample_rate: 1.0,
            telemetry_enabled: false,
            catalog_path: None,
        };

        let file_client = Client::connect(config).await.unwrap();
        file_client.tracking().start_task(json!({"prompt": "persisted"}), None).await.unwrap();
        file_client.shutdown().await;

        assert!(dir.path().join("evotrace.db").exists());
    }
}
