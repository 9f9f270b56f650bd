use rusqlite::{params, Connection, OptionalExtension, Row};

use evotrace_types::{Complexity, Pattern, PatternData, PatternId, PatternType};

use crate::error::{self, Result};
use crate::util::{self, to_json, PATTERN_SORT_COLUMNS};

fn type_to_db(t: PatternType) -> &'static str {
    t.as_str()
}

fn type_from_db(s: &str) -> Result<PatternType> {
    match s {
        "success" => Ok(PatternType::Success),
        "anti_pattern" => Ok(PatternType::AntiPattern),
        "optimization" => Ok(PatternType::Optimization),
        other => Err(error::validation(format!("unknown pattern type '{other}'"))),
    }
}

fn complexity_from_db(s: &str) -> Result<Complexity> {
    match s {
        "low" => Ok(Complexity::Low),
        "medium" => Ok(Complexity::Medium),
        "high" => Ok(Complexity::High),
        other => Err(error::validation(format!("unknown complexity '{other}'"))),
    }
}

fn complexity_to_db(c: Complexity) -> &'static str {
    match c {
        Complexity::Low => "low",
        Complexity::Medium => "medium",
        Complexity::High => "high",
    }
}

#[allow(clippy::type_complexity)]
type PatternRow = (
    String,
    String,
    f64,
    u64,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
    i64,
    bool,
    Option<String>,
    Option<String>,
    Option<String>,
    f64,
    f64,
);

fn row_to_pattern(row: &Row) -> rusqlite::Result<PatternRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
        row.get(15)?,
        row.get(16)?,
    ))
}

fn assemble(row: PatternRow) -> Result<Pattern> {
    let (
        id,
        pattern_type,
        confidence,
        occurrences,
        pattern_data,
        source_span_ids,
        applies_to_agent_type,
        applies_to_task_type,
        applies_to_skill,
        first_observed,
        last_observed,
        is_active,
        complexity,
        config_keys,
        context_metadata,
        group_success_rate,
        running_success_rate,
    ) = row;
    Ok(Pattern {
        id: id.parse().map_err(|e| error::validation(format!("malformed pattern id: {e}")))?,
        pattern_type: type_from_db(&pattern_type)?,
        confidence,
        occurrences,
        pattern_data: util::parse_json_required(&pattern_data, "pattern_data")?,
        source_span_ids: util::parse_json_or(&source_span_ids, Vec::new()),
        applies_to_agent_type,
        applies_to_task_type,
        applies_to_skill,
        first_observed,
        last_observed,
        is_active,
        complexity: complexity.map(|c| complexity_from_db(&c)).transpose()?,
        config_keys: config_keys.map(|c| util::parse_json_or(&c, Vec::new())),
        context_metadata: context_metadata.map(|c| util::parse_json_or(&c, serde_json::Value::Null)),
        group_success_rate,
        running_success_rate,
    })
}

const SELECT_COLUMNS: &str = "id, type, confidence, occurrences, pattern_data, source_span_ids, applies_to_agent_type, \
     applies_to_task_type, applies_to_skill, first_observed, last_observed, is_active, complexity, config_keys, \
     context_metadata, group_success_rate, running_success_rate";

pub fn record(conn: &Connection, pattern: &Pattern) -> Result<()> {
    pattern.check_invariants().map_err(error::validation)?;
    conn.execute(
        &format!(
            "INSERT INTO patterns ({SELECT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            pattern.id.to_string(),
            type_to_db(pattern.pattern_type),
            pattern.confidence,
            pattern.occurrences,
            to_json(&pattern.pattern_data)?,
            to_json(&pattern.source_span_ids)?,
            pattern.applies_to_agent_type,
            pattern.applies_to_task_type,
            pattern.applies_to_skill,
            pattern.first_observed,
            pattern.last_observed,
            pattern.is_active,
            pattern.complexity.map(complexity_to_db),
            pattern.config_keys.as_ref().map(to_json).transpose()?,
            pattern.context_metadata.as_ref().map(to_json).transpose()?,
            pattern.group_success_rate,
            pattern.running_success_rate,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: PatternId) -> Result<Pattern> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM patterns WHERE id = ?1"),
            params![id.to_string()],
            row_to_pattern,
        )
        .optional()?;
    match row {
        Some(row) => assemble(row),
        None => Err(error::not_found(format!("pattern '{id}' not found"))),
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PatternFilter {
    pub types: Option<Vec<PatternType>>,
    pub confidence_gte: Option<f64>,
    pub confidence_lte: Option<f64>,
    pub applies_to_agent_type: Option<String>,
    pub applies_to_task_type: Option<String>,
    pub applies_to_skill: Option<String>,
    pub is_active: Option<bool>,
    pub observed_gte: Option<i64>,
    pub observed_lte: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_column: String,
    pub sort_order: String,
}

impl PatternFilter {
    pub fn new() -> Self {
        Self {
            sort_column: "confidence".to_string(),
            sort_order: "DESC".to_string(),
            ..Default::default()
        }
    }
}

pub fn query(conn: &Connection, filter: PatternFilter) -> Result<Vec<Pattern>> {
    let (sort_column, sort_order) = util::validate_sort(PATTERN_SORT_COLUMNS, &filter.sort_column, &filter.sort_order)?;

    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(types) = &filter.types {
        let placeholders = types.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        clauses.push(format!("type IN ({placeholders})"));
        for t in types {
            values.push(Box::new(type_to_db(*t).to_string()));
        }
    }
    if let Some(v) = filter.confidence_gte {
        clauses.push("confidence >= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.confidence_lte {
        clauses.push("confidence <= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.applies_to_agent_type.clone() {
        clauses.push("applies_to_agent_type = ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.applies_to_task_type.clone() {
        clauses.push("applies_to_task_type = ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.applies_to_skill.clone() {
        clauses.push("applies_to_skill = ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.is_active {
        clauses.push("is_active = ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.observed_gte {
        clauses.push("last_observed >= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.observed_lte {
        clauses.push("first_observed <= ?".to_string());
        values.push(Box::new(v));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let limit = filter.limit.unwrap_or(100);
    let offset = filter.offset.unwrap_or(0);
    values.push(Box::new(limit));
    values.push(Box::new(offset));

    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM patterns {where_clause} ORDER BY {sort_column} {sort_order} LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), row_to_pattern)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

/// Updates confidence/occurrences/last_observed, e.g. after
/// `LearningEngine::update_pattern` folds in a new validated observation.
pub fn update(
    conn: &Connection,
    id: PatternId,
    confidence: f64,
    occurrences: u64,
    last_observed: i64,
    running_success_rate: f64,
) -> Result<Pattern> {
    conn.execute(
        "UPDATE patterns SET confidence = ?2, occurrences = ?3, last_observed = ?4, running_success_rate = ?5 WHERE id = ?1",
        params![id.to_string(), confidence, occurrences, last_observed, running_success_rate],
    )?;
    get(conn, id)
}

pub fn deactivate(conn: &Connection, id: PatternId) -> Result<Pattern> {
    conn.execute("UPDATE patterns SET is_active = 0 WHERE id = ?1", params![id.to_string()])?;
    get(conn, id)
}

pub fn get_active(
    conn: &Connection,
    agent_type: Option<&str>,
    task_type: Option<&str>,
    skill: Option<&str>,
) -> Result<Vec<Pattern>> {
    query(
        conn,
        PatternFilter {
            is_active: Some(true),
            applies_to_agent_type: agent_type.map(String::from),
            applies_to_task_type: task_type.map(String::from),
            applies_to_skill: skill.map(String::from),
            ..PatternFilter::new()
        },
    )
}

/// Trims an agent's pattern set down to `max_patterns`, dropping the
/// lowest-confidence rows first.
pub fn trim_to_limit(conn: &Connection, agent_type: &str, max_patterns: u64) -> Result<u64> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM patterns WHERE applies_to_agent_type = ?1",
        params![agent_type],
        |row| row.get(0),
    )?;
    if count <= max_patterns {
        return Ok(0);
    }
    let excess = count - max_patterns;
    let dropped = conn.execute(
        "DELETE FROM patterns WHERE id IN (
             SELECT id FROM patterns WHERE applies_to_agent_type = ?1
             ORDER BY confidence ASC LIMIT ?2
         )",
        params![agent_type, excess],
    )?;
    Ok(dropped as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use evotrace_types::{PatternEvidence, SpanId};

    fn sample_pattern(agent_type: &str, confidence: f64) -> Pattern {
        Pattern {
            id: PatternId::new(),
            pattern_type: PatternType::Success,
            confidence,
            occurrences: 5,
            pattern_data: PatternData {
                conditions: serde_json::json!({}),
                recommendations: serde_json::json!({"action": "adjust_prompt"}),
                expected_improvement: None,
                evidence: PatternEvidence { sample_size: 5, extra: Default::default() },
            },
            source_span_ids: vec![SpanId::new()],
            applies_to_agent_type: Some(agent_type.to_string()),
            applies_to_task_type: None,
            applies_to_skill: None,
            first_observed: 0,
            last_observed: 10,
            is_active: true,
            complexity: Some(Complexity::Low),
            config_keys: None,
            context_metadata: None,
            group_success_rate: 0.9,
            running_success_rate: 0.9,
        }
    }

    #[test]
    fn record_get_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let pattern = sample_pattern("researcher", 0.8);
        record(db.connection(), &pattern).unwrap();
        let fetched = get(db.connection(), pattern.id).unwrap();
        assert_eq!(fetched.confidence, 0.8);
    }

    #[test]
    fn trim_to_limit_drops_lowest_confidence_first() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            record(db.connection(), &sample_pattern("researcher", 0.5 + i as f64 * 0.1)).unwrap();
        }
        let dropped = trim_to_limit(db.connection(), "researcher", 3).unwrap();
        assert_eq!(dropped, 2);
        let remaining = get_active(db.connection(), Some("researcher"), None, None).unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.iter().all(|p| p.confidence >= 0.7));
    }

    #[test]
    fn query_rejects_unknown_sort_column() {
        let db = Database::open_in_memory().unwrap();
        let mut filter = PatternFilter::new();
        filter.sort_column = "pattern_data".to_string();
        assert!(query(db.connection(), filter).is_err());
    }
}
