use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{self, Error, Result};

/// Columns `Span::query` and `Pattern::query` are allowed to sort by. Sort
/// column and order are both validated against closed whitelists before
/// being substituted into SQL text — never interpolated from raw input.
pub const SPAN_SORT_COLUMNS: &[&str] = &[
    "start_time",
    "duration_ms",
    "status_code",
    "name",
    "kind",
    "end_time",
    "span_id",
    "trace_id",
    "task_id",
    "execution_id",
];

pub const PATTERN_SORT_COLUMNS: &[&str] = &["confidence", "occurrences", "last_observed"];

pub fn validate_sort(whitelist: &[&str], column: &str, order: &str) -> Result<(&'static str, &'static str)> {
    let column = whitelist
        .iter()
        .find(|c| **c == column)
        .copied()
        .ok_or_else(|| error::validation(format!("unsupported sort column '{column}'")))?;
    let order = match order.to_ascii_uppercase().as_str() {
        "ASC" => "ASC",
        "DESC" => "DESC",
        other => return Err(error::validation(format!("unsupported sort order '{other}'"))),
    };
    Ok((column, order))
}

/// Escapes `%`, `_`, and the escape character itself for use in a `LIKE`
/// clause with `ESCAPE '\'`.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Parses a JSON column defensively: malformed content logs a warning and
/// falls back to the caller-supplied default rather than failing the query.
pub fn parse_json_or<T: DeserializeOwned>(raw: &str, default: T) -> T {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, raw, "malformed JSON column, using default");
            default
        }
    }
}

pub fn parse_json_required<T: DeserializeOwned>(raw: &str, field: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|err| Error::Domain(evotrace_types::Error::storage(format!("malformed {field}: {err}"))))
}

pub fn to_json(value: &impl Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(|err| Error::Domain(evotrace_types::Error::storage(err.to_string())))
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_sort_accepts_whitelisted_pair() {
        let (col, ord) = validate_sort(SPAN_SORT_COLUMNS, "duration_ms", "desc").unwrap();
        assert_eq!(col, "duration_ms");
        assert_eq!(ord, "DESC");
    }

    #[test]
    fn validate_sort_rejects_unknown_column() {
        assert!(validate_sort(SPAN_SORT_COLUMNS, "attributes", "ASC").is_err());
    }

    #[test]
    fn validate_sort_rejects_unknown_order() {
        assert!(validate_sort(SPAN_SORT_COLUMNS, "name", "SIDEWAYS").is_err());
    }

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn parse_json_or_falls_back_on_malformed_input() {
        let value: Vec<i32> = parse_json_or("not json", vec![1, 2]);
        assert_eq!(value, vec![1, 2]);
    }
}
