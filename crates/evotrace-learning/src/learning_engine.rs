//! Derives typed, bounded, calibrated-confidence patterns from per-agent
//! execution history.

use std::collections::BTreeMap;

use evotrace_store::{PatternFilter, Store};
use evotrace_types::{Complexity, Pattern, PatternData, PatternEvidence, PatternId, PatternType, SpanId};
use serde_json::{json, Value};

use crate::error::Result;
use crate::metrics_view::{Metric, MetricsView};
use crate::stats_math::{mean, median, percentile};

#[derive(Debug, Clone, Copy)]
pub struct LearningConfig {
    pub min_observations: usize,
    pub min_confidence: f64,
    pub success_rate_threshold: f64,
    pub failure_rate_threshold: f64,
    pub max_patterns_per_agent: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_observations: 10,
            min_confidence: 0.7,
            success_rate_threshold: 0.8,
            failure_rate_threshold: 0.3,
            max_patterns_per_agent: 100,
        }
    }
}

pub struct LearningEngine {
    config: LearningConfig,
}

fn confidence(n: usize, k: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let k = k as f64;
    ((n / 30.0).min(1.0) * (k / n)).min(1.0)
}

fn span_ids_of<'a>(subset: impl Iterator<Item = &'a Metric>) -> Vec<SpanId> {
    let parsed: Vec<SpanId> = subset.filter_map(|m| m.execution_id.parse().ok()).collect();
    if parsed.is_empty() { vec![SpanId::new()] } else { parsed }
}

fn make_pattern(
    pattern_type: PatternType,
    agent_id: &str,
    task_type: &str,
    subset: &[&Metric],
    group_success_rate: f64,
    group_n: usize,
    action: Value,
    expected_improvement: Option<f64>,
) -> Pattern {
    let durations: Vec<f64> = subset.iter().map(|m| m.duration_ms).collect();
    let complexity = Complexity::from_mean_duration_ms(mean(&durations));
    let first_observed = subset.iter().map(|m| m.timestamp).min().unwrap_or(0);
    let last_observed = subset.iter().map(|m| m.timestamp).max().unwrap_or(first_observed);

    Pattern {
        id: PatternId::new(),
        pattern_type,
        confidence: confidence(group_n, subset.len()),
        occurrences: subset.len() as u64,
        pattern_data: PatternData {
            conditions: json!({ "task_type": task_type }),
            recommendations: action,
            expected_improvement,
            evidence: PatternEvidence { sample_size: subset.len() as u64, extra: Default::default() },
        },
        source_span_ids: span_ids_of(subset.iter().copied()),
        applies_to_agent_type: Some(agent_id.to_string()),
        applies_to_task_type: Some(task_type.to_string()),
        applies_to_skill: None,
        first_observed,
        last_observed,
        is_active: true,
        complexity: Some(complexity),
        config_keys: None,
        context_metadata: None,
        group_success_rate,
        running_success_rate: group_success_rate,
    }
}

impl LearningEngine {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    /// Groups `view.metrics(agent_id)` by `task_type` and applies the
    /// success/anti-pattern/optimization rules. Pure — does not touch the
    /// store; call [`LearningEngine::store_patterns`] to persist (and trim)
    /// the result.
    pub fn extract_patterns(&self, view: &dyn MetricsView, agent_id: &str) -> Vec<Pattern> {
        let metrics = view.metrics(agent_id);
        let mut groups: BTreeMap<String, Vec<&Metric>> = BTreeMap::new();
        for m in &metrics {
            groups.entry(m.task_type.clone()).or_default().push(m);
        }

        let mut patterns = Vec::new();
        for (task_type, group) in groups {
            patterns.extend(self.extract_for_group(agent_id, &task_type, &group));
        }
        patterns
    }

    fn extract_for_group(&self, agent_id: &str, task_type: &str, group: &[&Metric]) -> Vec<Pattern> {
        let min_obs = self.config.min_observations;
        let n = group.len();
        if n == 0 {
            return Vec::new();
        }
        let success_count = group.iter().filter(|m| m.success).count();
        let success_rate = success_count as f64 / n as f64;
        let failure_rate = 1.0 - success_rate;

        let mut out = Vec::new();

        if success_rate >= self.config.success_rate_threshold {
            let successful: Vec<&&Metric> = group.iter().filter(|m| m.success).collect();

            let high_quality: Vec<&Metric> =
                successful.iter().filter(|m| m.quality_score >= 0.8).map(|m| **m).collect();
            if high_quality.len() >= min_obs {
                out.push(make_pattern(
                    PatternType::Success,
                    agent_id,
                    task_type,
                    &high_quality,
                    success_rate,
                    n,
                    json!({ "action": "adjust_prompt", "strategy": "quality-focused" }),
                    None,
                ));
            }

            let costs: Vec<f64> = successful.iter().map(|m| m.cost).collect();
            let median_cost = median(&costs);
            let variation_threshold = (0.10 * median_cost).max(0.01);
            let has_variation = costs.iter().any(|c| (c - median_cost).abs() > variation_threshold);
            if has_variation {
                let efficient: Vec<&Metric> = successful
                    .iter()
                    .filter(|m| m.quality_score >= 0.8 && m.cost <= median_cost)
                    .map(|m| **m)
                    .collect();
                if efficient.len() >= min_obs {
                    out.push(make_pattern(
                        PatternType::Success,
                        agent_id,
                        task_type,
                        &efficient,
                        success_rate,
                        n,
                        json!({ "action": "adjust_prompt", "strategy": "efficient" }),
                        None,
                    ));
                }
            }
        }

        if failure_rate >= self.config.failure_rate_threshold {
            let durations: Vec<f64> = group.iter().map(|m| m.duration_ms).collect();
            let p95 = percentile(&durations, 0.95);
            // "above p95" can by construction never collect min_obs/2 of a
            // small failure set (p95 excludes ~95% of any population). Use
            // the median duration *within the failing subset* to pick out
            // the slower half of failures, and keep p95 only for the
            // reported timeout bound.
            let failures: Vec<&Metric> = group.iter().filter(|m| !m.success).map(|m| **m).collect();
            let failure_durations: Vec<f64> = failures.iter().map(|m| m.duration_ms).collect();
            let failure_median = median(&failure_durations);
            let timeouts: Vec<&Metric> =
                failures.iter().filter(|m| m.duration_ms >= failure_median).copied().collect();
            if timeouts.len() >= min_obs / 2 {
                out.push(make_pattern(
                    PatternType::AntiPattern,
                    agent_id,
                    task_type,
                    &timeouts,
                    success_rate,
                    n,
                    json!({ "action": "modify_timeout", "timeout_ms": (p95 * 1.5).round() }),
                    None,
                ));
            }

            let low_quality: Vec<&Metric> =
                group.iter().filter(|m| m.success && m.quality_score < 0.5).map(|m| **m).collect();
            if low_quality.len() >= min_obs / 2 {
                out.push(make_pattern(
                    PatternType::AntiPattern,
                    agent_id,
                    task_type,
                    &low_quality,
                    success_rate,
                    n,
                    json!({ "action": "adjust_prompt", "strategy": "quality-focused" }),
                    None,
                ));
            }
        }

        let candidates: Vec<&Metric> =
            group.iter().filter(|m| m.success && m.quality_score >= 0.7).map(|m| **m).collect();
        if candidates.len() >= min_obs {
            let mean_cost = mean(&candidates.iter().map(|m| m.cost).collect::<Vec<_>>());
            let optimized: Vec<&Metric> =
                candidates.iter().filter(|m| m.cost < 0.8 * mean_cost && m.quality_score >= 0.8).copied().collect();
            if optimized.len() >= min_obs / 2 {
                out.push(make_pattern(
                    PatternType::Optimization,
                    agent_id,
                    task_type,
                    &optimized,
                    success_rate,
                    n,
                    json!({ "action": "change_model", "target_cost_reduction": 0.2, "quality_floor": 0.8 }),
                    Some(0.2),
                ));
            }
        }

        out
    }

    /// Persists each pattern, then trims the agent's set down to
    /// `max_patterns_per_agent`, dropping the lowest-confidence rows first.
    pub fn store_patterns(&self, store: &Store, agent_id: &str, patterns: &[Pattern]) -> Result<u64> {
        for pattern in patterns {
            store.record_pattern(pattern)?;
        }
        let dropped = store.trim_patterns_to_limit(agent_id, self.config.max_patterns_per_agent)?;
        Ok(dropped)
    }

    /// Folds in one subsequent validated observation: bumps `occurrences`,
    /// recomputes the pattern-local running success rate, and nudges
    /// confidence up by 0.02 (capped at 1.0). Deliberately tracked
    /// separately from the fixed `group_success_rate` captured at creation.
    pub fn update_pattern(pattern: &mut Pattern, success: bool, now: i64) {
        let prior_successes = pattern.running_success_rate * pattern.occurrences as f64;
        pattern.occurrences += 1;
        let successes = prior_successes + if success { 1.0 } else { 0.0 };
        pattern.running_success_rate = successes / pattern.occurrences as f64;
        pattern.confidence = (pattern.confidence + 0.02).min(1.0);
        pattern.last_observed = now;
    }

    pub fn apply_update(&self, store: &Store, id: PatternId, success: bool, now: i64) -> Result<Pattern> {
        let mut pattern = store.get_pattern(id)?;
        Self::update_pattern(&mut pattern, success, now);
        let updated =
            store.update_pattern(pattern.id, pattern.confidence, pattern.occurrences, pattern.last_observed, pattern.running_success_rate)?;
        Ok(updated)
    }

    /// Patterns filtered by `confidence >= min_confidence`, optionally
    /// complexity-matched, sorted by `confidence * successRate` descending.
    pub fn recommend(
        &self,
        store: &Store,
        agent_type: &str,
        task_type: &str,
        complexity: Option<Complexity>,
    ) -> Result<Vec<Pattern>> {
        let mut patterns = store.query_patterns(PatternFilter {
            applies_to_agent_type: Some(agent_type.to_string()),
            applies_to_task_type: Some(task_type.to_string()),
            confidence_gte: Some(self.config.min_confidence),
            is_active: Some(true),
            ..PatternFilter::new()
        })?;
        if let Some(c) = complexity {
            patterns.retain(|p| p.complexity == Some(c));
        }
        patterns.sort_by(|a, b| {
            let sa = a.confidence * a.running_success_rate;
            let sb = b.confidence * b.running_success_rate;
            sb.partial_cmp(&sa).unwrap()
        });
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_view::InMemoryMetricsView;

    fn metric(execution_id: &str, success: bool, duration_ms: f64, cost: f64, quality: f64, ts: i64) -> Metric {
        Metric {
            execution_id: execution_id.to_string(),
            agent_id: "code-reviewer".to_string(),
            task_type: "code-review".to_string(),
            success,
            duration_ms,
            cost,
            quality_score: quality,
            user_satisfaction: None,
            timestamp: ts,
            metadata: None,
        }
    }

    #[test]
    fn s1_pattern_emergence() {
        let rows: Vec<Metric> =
            (0..15).map(|i| metric(&format!("e{i}"), true, 8000.0, 0.04, 0.9, i as i64)).collect();
        let view = InMemoryMetricsView::new(rows);
        let engine = LearningEngine::new(LearningConfig::default());
        let patterns = engine.extract_patterns(&view, "code-reviewer");

        let success_patterns: Vec<_> = patterns.iter().filter(|p| p.pattern_type == PatternType::Success).collect();
        assert_eq!(success_patterns.len(), 1);
        assert_eq!(success_patterns[0].occurrences, 15);
        assert!((success_patterns[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn s2_timeout_anti_pattern() {
        let rows: Vec<Metric> = (0..20)
            .map(|i| {
                let duration = 20000.0 + (i as f64 / 19.0) * 20000.0;
                metric(&format!("e{i}"), false, duration, 0.05, 0.3, i as i64)
            })
            .collect();
        let view = InMemoryMetricsView::new(rows);
        let engine = LearningEngine::new(LearningConfig::default());
        let patterns = engine.extract_patterns(&view, "code-reviewer");

        let anti: Vec<_> = patterns.iter().filter(|p| p.pattern_type == PatternType::AntiPattern).collect();
        assert!(!anti.is_empty());
        let timeout = anti
            .iter()
            .find(|p| p.pattern_data.recommendations.get("action").and_then(Value::as_str) == Some("modify_timeout"));
        assert!(timeout.is_some());
    }

    #[test]
    fn update_pattern_tracks_running_rate_and_bumps_confidence() {
        let mut pattern = make_pattern(
            PatternType::Success,
            "a",
            "t",
            &[],
            1.0,
            10,
            json!({}),
            None,
        );
        pattern.occurrences = 10;
        pattern.running_success_rate = 1.0;
        pattern.confidence = 0.5;
        LearningEngine::update_pattern(&mut pattern, false, 100);
        assert_eq!(pattern.occurrences, 11);
        assert!((pattern.running_success_rate - 10.0 / 11.0).abs() < 1e-9);
        assert!((pattern.confidence - 0.52).abs() < 1e-9);
    }
}
