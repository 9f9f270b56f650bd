//! Per-agent-type evolution thresholds `LearningEngine`, `Optimizer` and
//! `AbEngine` read instead of hardcoding.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{self, Result};
use crate::learning_engine::LearningConfig;

const DEFAULT_KEY: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default = "defaults::min_observations")]
    pub min_observations: usize,
    #[serde(default = "defaults::min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "defaults::success_rate_threshold")]
    pub success_rate_threshold: f64,
    #[serde(default = "defaults::failure_rate_threshold")]
    pub failure_rate_threshold: f64,
    #[serde(default = "defaults::max_patterns_per_agent")]
    pub max_patterns_per_agent: u64,
    #[serde(default = "defaults::max_success_patterns")]
    pub max_success_patterns: u64,
    #[serde(default = "defaults::max_anti_patterns")]
    pub max_anti_patterns: u64,
    #[serde(default = "defaults::max_optimizations")]
    pub max_optimizations: u64,
}

mod defaults {
    pub fn min_observations() -> usize {
        10
    }
    pub fn min_confidence() -> f64 {
        0.7
    }
    pub fn success_rate_threshold() -> f64 {
        0.8
    }
    pub fn failure_rate_threshold() -> f64 {
        0.3
    }
    pub fn max_patterns_per_agent() -> u64 {
        100
    }
    pub fn max_success_patterns() -> u64 {
        40
    }
    pub fn max_anti_patterns() -> u64 {
        40
    }
    pub fn max_optimizations() -> u64 {
        20
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            min_observations: defaults::min_observations(),
            min_confidence: defaults::min_confidence(),
            success_rate_threshold: defaults::success_rate_threshold(),
            failure_rate_threshold: defaults::failure_rate_threshold(),
            max_patterns_per_agent: defaults::max_patterns_per_agent(),
            max_success_patterns: defaults::max_success_patterns(),
            max_anti_patterns: defaults::max_anti_patterns(),
            max_optimizations: defaults::max_optimizations(),
        }
    }
}

impl From<&EvolutionConfig> for LearningConfig {
    fn from(cfg: &EvolutionConfig) -> Self {
        Self {
            min_observations: cfg.min_observations,
            min_confidence: cfg.min_confidence,
            success_rate_threshold: cfg.success_rate_threshold,
            failure_rate_threshold: cfg.failure_rate_threshold,
            max_patterns_per_agent: cfg.max_patterns_per_agent,
        }
    }
}

/// In-memory registry of `EvolutionConfig` keyed by agent type, falling
/// back to the `"*"` entry, then to hardcoded defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvolutionCatalog {
    #[serde(default)]
    agents: HashMap<String, EvolutionConfig>,
}

impl EvolutionCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, agent_type: &str) -> EvolutionConfig {
        self.agents
            .get(agent_type)
            .or_else(|| self.agents.get(DEFAULT_KEY))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&mut self, agent_type: impl Into<String>, config: EvolutionConfig) {
        self.agents.insert(agent_type.into(), config);
    }

    /// Loads a TOML catalog file. A missing path is not an error — callers
    /// get the all-defaults catalog.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| error::state(format!("failed to read catalog '{}': {e}", path.display())))?;
        toml::from_str(&contents).map_err(|e| error::validation(format!("malformed evolution catalog '{}': {e}", path.display())))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let serialized = toml::to_string_pretty(self).map_err(|e| error::state(format!("failed to serialize evolution catalog: {e}")))?;
        std::fs::write(path, serialized).map_err(|e| error::state(format!("failed to write catalog '{}': {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_falls_back_to_default_entry_then_hardcoded_defaults() {
        let mut catalog = EvolutionCatalog::empty();
        assert_eq!(catalog.get("code-reviewer").min_observations, 10);

        catalog.set("*", EvolutionConfig { min_observations: 5, ..Default::default() });
        assert_eq!(catalog.get("code-reviewer").min_observations, 5);

        catalog.set("code-reviewer", EvolutionConfig { min_observations: 20, ..Default::default() });
        assert_eq!(catalog.get("code-reviewer").min_observations, 20);
        assert_eq!(catalog.get("other-agent").min_observations, 5);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        let mut catalog = EvolutionCatalog::empty();
        catalog.set("planner", EvolutionConfig { min_confidence: 0.9, ..Default::default() });
        catalog.save_to(&path).unwrap();

        let loaded = EvolutionCatalog::load_from(&path).unwrap();
        assert_eq!(loaded.get("planner").min_confidence, 0.9);
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let catalog = EvolutionCatalog::load_from(&path).unwrap();
        assert_eq!(catalog.get("anything").min_observations, 10);
    }
}
