use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, evotrace_types::Error>;

/// Resolve the workspace data directory based on priority:
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

    Err(evotrace_types::Error::validation(
        "could not determine workspace path: no HOME directory or platform data directory found",
    ))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Validate that `candidate`, once joined to `base` and normalized, stays
/// within `base`. Rejects traversal (`..`) escapes and absolute paths that
/// jump outside the allow-listed base directory.
///
/// Every store path and bootstrap-file path that ultimately comes from a
/// caller MUST be run through this before being opened.
pub fn validate_within_base(base: &Path, candidate: &Path) -> Result<PathBuf> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    };

    let normalized = normalize_lexically(&joined);
    let normalized_base = normalize_lexically(base);

    if !normalized.starts_with(&normalized_base) {
        return Err(evotrace_types::Error::validation(format!(
            "path '{}' escapes allow-listed base directory '{}'",
            candidate.display(),
            base.display()
        )));
    }

    Ok(normalized)
}

/// Lexically collapse `.`/`..` components without touching the filesystem
/// (so this works for paths that do not exist yet, e.g. a fresh db file).
fn normalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_relative_path_within_base() {
        let base = Path::new("/data/evotrace");
        let result = validate_within_base(base, Path::new("store.db")).unwrap();
        assert_eq!(result, PathBuf::from("/data/evotrace/store.db"));
    }

    #[test]
    fn rejects_traversal_escape() {
        let base = Path::new("/data/evotrace");
        let err = validate_within_base(base, Path::new("../../etc/passwd")).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn rejects_absolute_jump_outside_base() {
        let base = Path::new("/data/evotrace");
        let err = validate_within_base(base, Path::new("/etc/passwd")).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn allows_nested_subdirectory() {
        let base = Path::new("/data/evotrace");
        let result = validate_within_base(base, Path::new("bootstrap/seed.json")).unwrap();
        assert_eq!(result, PathBuf::from("/data/evotrace/bootstrap/seed.json"));
    }

    #[test]
    fn expand_tilde_leaves_non_tilde_paths_untouched() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
