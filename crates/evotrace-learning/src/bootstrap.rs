//! Imports curated seed patterns for an agent with too little history of
//! its own to have learned anything yet.

use std::collections::BTreeSet;

use evotrace_store::Store;
use evotrace_types::{Pattern, PatternData, PatternEvidence, PatternId, PatternType, SpanId};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{self, Result};

const MAX_BOOTSTRAP_BYTES: usize = 10 * 1024 * 1024;
const MIN_TASK_COUNT_FOR_NO_OP: u64 = 10;
const VALID_ACTION_TYPES: &[&str] = &["adjust_prompt", "change_model", "add_step", "remove_step", "modify_timeout"];

#[derive(Debug, Deserialize)]
struct BootstrapFile {
    version: String,
    #[allow(dead_code)]
    description: String,
    patterns: Vec<BootstrapPatternInput>,
}

#[derive(Debug, Deserialize)]
struct BootstrapPatternInput {
    id: String,
    #[serde(rename = "type")]
    pattern_type: String,
    name: String,
    description: String,
    sequence: Vec<String>,
    confidence: f64,
    #[serde(rename = "observationCount")]
    observation_count: u64,
    #[serde(rename = "successCount")]
    success_count: u64,
    #[serde(rename = "successRate")]
    success_rate: f64,
    #[serde(rename = "taskType")]
    task_type: String,
    conditions: Option<Value>,
    action: BootstrapAction,
}

#[derive(Debug, Deserialize)]
struct BootstrapAction {
    #[serde(rename = "type")]
    action_type: String,
    parameters: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub updated: usize,
    pub dropped: Vec<(String, String)>,
    pub no_op: bool,
}

pub struct BootstrapLoader;

fn pattern_type_from_bootstrap(s: &str) -> Option<PatternType> {
    match s {
        "success" => Some(PatternType::Success),
        "anti-pattern" | "failure" => Some(PatternType::AntiPattern),
        "optimization" => Some(PatternType::Optimization),
        _ => None,
    }
}

fn validate(
    input: &BootstrapPatternInput,
    registered_agent_ids: &BTreeSet<String>,
) -> std::result::Result<(), String> {
    if input.id.trim().is_empty() || input.name.trim().is_empty() || input.description.trim().is_empty() || input.task_type.trim().is_empty() {
        return Err("required string field is empty".to_string());
    }
    if pattern_type_from_bootstrap(&input.pattern_type).is_none() {
        return Err(format!("unknown pattern type '{}'", input.pattern_type));
    }
    if !VALID_ACTION_TYPES.contains(&input.action.action_type.as_str()) {
        return Err(format!("unknown action type '{}'", input.action.action_type));
    }
    if input.sequence.len() < 2 {
        return Err("sequence must have at least 2 steps".to_string());
    }
    if let Some(unregistered) = input.sequence.iter().find(|step| !registered_agent_ids.contains(*step)) {
        return Err(format!("sequence references unregistered agent id '{unregistered}'"));
    }
    if !(0.0..=1.0).contains(&input.confidence) {
        return Err(format!("confidence {} out of [0,1]", input.confidence));
    }
    if input.observation_count == 0 {
        return Err("observationCount must be >= 1".to_string());
    }
    let rounded = (input.success_rate * input.observation_count as f64).round() / input.observation_count as f64;
    let consistent = if input.observation_count < 1000 {
        (input.success_rate - rounded).abs() < 1e-9
    } else {
        (input.success_rate - rounded).abs() <= 1e-4
    };
    if !consistent {
        return Err(format!(
            "successRate {} inconsistent with successCount/observationCount ({}/{})",
            input.success_rate, input.success_count, input.observation_count
        ));
    }
    Ok(())
}

fn to_pattern(input: BootstrapPatternInput, agent_type: &str, now: i64) -> Pattern {
    let pattern_type = pattern_type_from_bootstrap(&input.pattern_type).expect("validated");
    let mut conditions = input.conditions.unwrap_or_else(|| Value::Object(Default::default()));
    if let Value::Object(map) = &mut conditions {
        map.insert("sequence".to_string(), Value::Array(input.sequence.iter().cloned().map(Value::String).collect()));
    }
    Pattern {
        id: PatternId::new(),
        pattern_type,
        confidence: input.confidence,
        occurrences: input.observation_count,
        pattern_data: PatternData {
            conditions,
            recommendations: serde_json::json!({ "action": input.action.action_type, "parameters": input.action.parameters }),
            expected_improvement: None,
            evidence: PatternEvidence { sample_size: input.observation_count, extra: Default::default() },
        },
        source_span_ids: vec![SpanId::new()],
        applies_to_agent_type: Some(agent_type.to_string()),
        applies_to_task_type: Some(input.task_type),
        applies_to_skill: None,
        first_observed: now,
        last_observed: now,
        is_active: true,
        complexity: None,
        config_keys: None,
        context_metadata: Some(serde_json::json!({ "bootstrap_id": input.id, "name": input.name, "description": input.description })),
        group_success_rate: input.success_rate,
        running_success_rate: input.success_rate,
    }
}

fn find_existing(store: &Store, agent_type: &str, bootstrap_id: &str) -> Result<Option<Pattern>> {
    let active = store.get_active_patterns(Some(agent_type), None, None)?;
    Ok(active.into_iter().find(|p| {
        p.context_metadata
            .as_ref()
            .and_then(|m| m.get("bootstrap_id"))
            .and_then(Value::as_str)
            == Some(bootstrap_id)
    }))
}

impl BootstrapLoader {
    /// Parses, validates and persists a bootstrap file for `agent_type`.
    /// A no-op (not an error) when `existing_task_count` is already >= 10.
    /// Patterns failing validation are dropped with a per-pattern reason;
    /// the rest are imported. Re-importing the same `bootstrap_id` updates
    /// the existing row in place rather than duplicating it, preserving
    /// `first_observed`.
    pub fn import(
        store: &Store,
        agent_type: &str,
        registered_agent_ids: &BTreeSet<String>,
        existing_task_count: u64,
        our_major_version: u32,
        bytes: &[u8],
        now: i64,
    ) -> Result<ImportSummary> {
        if bytes.len() > MAX_BOOTSTRAP_BYTES {
            return Err(error::validation(format!("bootstrap file is {} bytes, exceeds 10 MiB limit", bytes.len())));
        }
        let file: BootstrapFile =
            serde_json::from_slice(bytes).map_err(|e| error::validation(format!("malformed bootstrap file: {e}")))?;

        let major: u32 = file
            .version
            .split('.')
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| error::validation(format!("malformed version '{}'", file.version)))?;
        if major != our_major_version {
            return Err(error::validation(format!(
                "bootstrap file major version {major} incompatible with engine major version {our_major_version}"
            )));
        }

        if existing_task_count >= MIN_TASK_COUNT_FOR_NO_OP {
            return Ok(ImportSummary { no_op: true, dropped: vec![], imported: 0, updated: 0 });
        }

        let mut summary = ImportSummary::default();
        for input in file.patterns {
            if let Err(reason) = validate(&input, registered_agent_ids) {
                summary.dropped.push((input.id, reason));
                continue;
            }
            let bootstrap_id = input.id.clone();
            match find_existing(store, agent_type, &bootstrap_id)? {
                Some(existing) => {
                    let refreshed = to_pattern(input, agent_type, now);
                    store.update_pattern(existing.id, refreshed.confidence, refreshed.occurrences, now, refreshed.running_success_rate)?;
                    summary.updated += 1;
                }
                None => {
                    let pattern = to_pattern(input, agent_type, now);
                    store.record_pattern(&pattern)?;
                    summary.imported += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> BTreeSet<String> {
        BTreeSet::from(["planner".to_string(), "coder".to_string()])
    }

    fn sample_json() -> Vec<u8> {
        serde_json::json!({
            "version": "1.2.0",
            "description": "seed patterns",
            "patterns": [
                {
                    "id": "seed-1",
                    "type": "success",
                    "name": "plan-then-code",
                    "description": "planner followed by coder",
                    "sequence": ["planner", "coder"],
                    "confidence": 0.8,
                    "observationCount": 50,
                    "successCount": 40,
                    "successRate": 0.8,
                    "taskType": "feature-build",
                    "conditions": null,
                    "action": { "type": "adjust_prompt", "parameters": null }
                },
                {
                    "id": "seed-bad",
                    "type": "success",
                    "name": "broken",
                    "description": "bad rate",
                    "sequence": ["planner", "coder"],
                    "confidence": 0.8,
                    "observationCount": 50,
                    "successCount": 40,
                    "successRate": 0.1234,
                    "taskType": "feature-build",
                    "conditions": null,
                    "action": { "type": "adjust_prompt", "parameters": null }
                }
            ]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn s6_bootstrap_import_drops_inconsistent_pattern() {
        let store = Store::open_in_memory().unwrap();
        let summary = BootstrapLoader::import(&store, "code-reviewer", &registered(), 0, 1, &sample_json(), 0).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.dropped.len(), 1);
        assert_eq!(summary.dropped[0].0, "seed-bad");
    }

    #[test]
    fn import_is_no_op_when_agent_has_enough_history() {
        let store = Store::open_in_memory().unwrap();
        let summary = BootstrapLoader::import(&store, "code-reviewer", &registered(), 10, 1, &sample_json(), 0).unwrap();
        assert!(summary.no_op);
        assert_eq!(summary.imported, 0);
    }

    #[test]
    fn reimport_updates_existing_pattern_preserving_first_observed() {
        let store = Store::open_in_memory().unwrap();
        let first = BootstrapLoader::import(&store, "code-reviewer", &registered(), 0, 1, &sample_json(), 100).unwrap();
        assert_eq!(first.imported, 1);
        let second = BootstrapLoader::import(&store, "code-reviewer", &registered(), 0, 1, &sample_json(), 200).unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(second.imported, 0);

        let active = store.get_active_patterns(Some("code-reviewer"), None, None).unwrap();
        let pattern = active
            .iter()
            .find(|p| p.context_metadata.as_ref().and_then(|m| m.get("bootstrap_id")).and_then(Value::as_str) == Some("seed-1"))
            .unwrap();
        assert_eq!(pattern.first_observed, 100);
    }

    #[test]
    fn rejects_incompatible_major_version() {
        let store = Store::open_in_memory().unwrap();
        let result = BootstrapLoader::import(&store, "code-reviewer", &registered(), 0, 2, &sample_json(), 0);
        assert!(result.is_err());
    }
}
