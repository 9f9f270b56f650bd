//! Custom assertions for evotrace-specific validation.

use anyhow::{Context, Result, bail};
use evotrace_types::Pattern;

/// Asserts `pattern.confidence` lies in `range`, with a message naming the pattern.
pub fn assert_confidence_in_range(pattern: &Pattern, range: std::ops::RangeInclusive<f64>) -> Result<()> {
    if !range.contains(&pattern.confidence) {
        bail!("pattern '{}' confidence {} outside expected range {:?}", pattern.id, pattern.confidence, range);
    }
    Ok(())
}

/// Asserts a running success rate (observations / successes already divided)
/// is within `tolerance` of `expected`.
pub fn assert_success_rate_close(actual: f64, expected: f64, tolerance: f64) -> Result<()> {
    let diff = (actual - expected).abs();
    if diff > tolerance {
        bail!("success rate {actual} differs from expected {expected} by {diff}, exceeds tolerance {tolerance}");
    }
    Ok(())
}

/// Asserts `patterns` contains exactly one entry for `task_type`, returning it.
pub fn assert_single_pattern_for_task_type<'a>(patterns: &'a [Pattern], task_type: &str) -> Result<&'a Pattern> {
    let matches: Vec<&Pattern> =
        patterns.iter().filter(|p| p.applies_to_task_type.as_deref() == Some(task_type)).collect();
    match matches.as_slice() {
        [single] => Ok(single),
        [] => bail!("no pattern found for task_type '{task_type}'"),
        _ => bail!("expected exactly one pattern for task_type '{task_type}', found {}", matches.len()),
    }
}

/// Parses `bytes` as JSON and asserts `pointer` resolves to a value.
pub fn assert_json_pointer_present(bytes: &[u8], pointer: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_slice(bytes).context("invalid JSON")?;
    value.pointer(pointer).cloned().with_context(|| format!("JSON pointer '{pointer}' not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_close_within_tolerance() {
        assert!(assert_success_rate_close(0.81, 0.8, 0.05).is_ok());
        assert!(assert_success_rate_close(0.5, 0.8, 0.05).is_err());
    }

    #[test]
    fn json_pointer_present_finds_nested_value() {
        let bytes = serde_json::to_vec(&serde_json::json!({"a": {"b": 1}})).unwrap();
        assert!(assert_json_pointer_present(&bytes, "/a/b").is_ok());
        assert!(assert_json_pointer_present(&bytes, "/a/c").is_err());
    }
}
