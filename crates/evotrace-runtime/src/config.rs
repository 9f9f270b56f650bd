//! Environment-driven configuration. Priority for the storage path: explicit
//! argument, then `EVOTRACE_PATH`, then the platform data dir, then
//! `~/.evotrace`.

use std::path::PathBuf;

use evotrace_store::OpenOptions;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub storage_path: PathBuf,
    pub db_busy_timeout_ms: u32,
    pub wal: bool,
    pub sample_rate: f64,
    pub telemetry_enabled: bool,
    pub catalog_path: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Reads every `EVOTRACE_*` environment variable this crate recognizes,
    /// falling back to its documented default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            storage_path: resolve_workspace_path(None)?,
            db_busy_timeout_ms: env_u32("EVOTRACE_DB_BUSY_TIMEOUT_MS", 5000),
            wal: env_bool("EVOTRACE_WAL", true),
            sample_rate: env_f64("EVOTRACE_SAMPLE_RATE", 1.0),
            telemetry_enabled: env_bool("EVOTRACE_TELEMETRY_ENABLED", true),
            catalog_path: std::env::var("EVOTRACE_CATALOG_PATH").ok().map(PathBuf::from),
        })
    }

    pub fn open_options(&self) -> OpenOptions {
        OpenOptions { wal: self.wal, busy_timeout_ms: self.db_busy_timeout_ms }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v != "0",
        Err(_) => default,
    }
}

/// Resolve the workspace data directory:
/// 1. Explicit path (with tilde expansion)
/// 2. `EVOTRACE_PATH` environment variable (with tilde expansion)
/// 3. Platform data directory
/// 4. `~/.evotrace` fallback
pub fn resolve_workspace_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }
    if let Ok(env_path) = std::env::var("EVOTRACE_PATH") {
        return Ok(expand_tilde(&env_path));
    }
    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("evotrace"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".evotrace"));
    }
    Err(Error::Config("could not determine workspace path: no HOME or platform data dir found".to_string()))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_over_everything() {
        let resolved = resolve_workspace_path(Some("/tmp/explicit")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/explicit"));
    }

    #[test]
    fn expands_leading_tilde() {
        let resolved = resolve_workspace_path(Some("~/evotrace-data")).unwrap();
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(resolved, PathBuf::from(home).join("evotrace-data"));
        }
    }
}
