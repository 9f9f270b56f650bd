//! The store-backed [`MetricsView`] `LearningEngine::extract_patterns`
//! mines in production: one flattened [`Metric`] per span that carries an
//! `execution.success` attribute (i.e. the top-level span of an
//! `Instrumentation::wrap` call), joined against its owning task for
//! `task_type`.

use evotrace_learning::{Metric, MetricsView};
use evotrace_store::{SpanFilter, Store};

pub struct StoreMetricsView<'a> {
    store: &'a Store,
}

impl<'a> StoreMetricsView<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl MetricsView for StoreMetricsView<'_> {
    fn metrics(&self, agent_id: &str) -> Vec<Metric> {
        let spans = match self.store.query_spans(SpanFilter { limit: Some(10_000), ..SpanFilter::new() }) {
            Ok(spans) => spans,
            Err(_) => return Vec::new(),
        };

        spans
            .into_iter()
            .filter(|span| span.attributes.get("agent.id").and_then(|v| v.as_str()) == Some(agent_id))
            .filter_map(|span| {
                let success = span.attributes.get("execution.success")?.as_bool()?;
                let task_type = self.store.get_task(span.task_id).ok().and_then(|t| t.task_type).unwrap_or_default();
                Some(Metric {
                    execution_id: span.execution_id.to_string(),
                    agent_id: agent_id.to_string(),
                    task_type,
                    success,
                    duration_ms: span.duration_ms.unwrap_or(0) as f64,
                    cost: span.attributes.get("execution.cost").and_then(|v| v.as_f64()).unwrap_or(0.0),
                    quality_score: span.attributes.get("execution.quality_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
                    user_satisfaction: None,
                    timestamp: span.start_time,
                    metadata: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use evotrace_testing::fixtures::{record_execution_span, seeded_store};

    use super::*;

    #[test]
    fn metrics_joins_task_type_and_skips_spans_without_execution_success() {
        let (store, task) = seeded_store().unwrap();
        record_execution_span(&store, task.id, "summarizer-1", "summarizer", true, 800, 1_700_000_000).unwrap();
        record_execution_span(&store, task.id, "summarizer-1", "summarizer", false, 1200, 1_700_000_100).unwrap();
        record_execution_span(&store, task.id, "other-agent", "summarizer", true, 500, 1_700_000_200).unwrap();

        let view = StoreMetricsView::new(&store);
        let metrics = view.metrics("summarizer-1");

        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|m| m.agent_id == "summarizer-1"));
        assert!(metrics.iter().any(|m| m.success));
        assert!(metrics.iter().any(|m| !m.success));
    }
}
