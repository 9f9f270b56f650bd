use rusqlite::{params, Connection, OptionalExtension, Row};

use evotrace_types::{Adaptation, AdaptationId, AdaptationType, PatternId};

use crate::error::{self, Result};
use crate::util::{self, to_json};

fn type_from_db(s: &str) -> Result<AdaptationType> {
    match s {
        "config" => Ok(AdaptationType::Config),
        "prompt" => Ok(AdaptationType::Prompt),
        "strategy" => Ok(AdaptationType::Strategy),
        "resource" => Ok(AdaptationType::Resource),
        "skill" => Ok(AdaptationType::Skill),
        other => Err(error::validation(format!("unknown adaptation type '{other}'"))),
    }
}

fn type_to_db(t: AdaptationType) -> &'static str {
    match t {
        AdaptationType::Config => "config",
        AdaptationType::Prompt => "prompt",
        AdaptationType::Strategy => "strategy",
        AdaptationType::Resource => "resource",
        AdaptationType::Skill => "skill",
    }
}

#[allow(clippy::type_complexity)]
type AdaptationRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
    u64,
    u64,
    f64,
    bool,
    Option<i64>,
    Option<String>,
);

fn row_to_adaptation(row: &Row) -> rusqlite::Result<AdaptationRow> {
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
    ))
}

fn assemble(row: AdaptationRow) -> Result<Adaptation> {
    let (
        id,
        pattern_id,
        adaptation_type,
        before_config,
        after_config,
        applied_to_agent_id,
        applied_to_task_type,
        applied_to_skill,
        applied_at,
        success_count,
        failure_count,
        avg_improvement,
        is_active,
        deactivated_at,
        deactivation_reason,
    ) = row;
    Ok(Adaptation {
        id: id.parse().map_err(|e| error::validation(format!("malformed adaptation id: {e}")))?,
        pattern_id: pattern_id.parse().map_err(|e| error::validation(format!("malformed pattern id: {e}")))?,
        adaptation_type: type_from_db(&adaptation_type)?,
        before_config: util::parse_json_or(&before_config, serde_json::Value::Null),
        after_config: util::parse_json_or(&after_config, serde_json::Value::Null),
        applied_to_agent_id,
        applied_to_task_type,
        applied_to_skill,
        applied_at,
        success_count,
        failure_count,
        avg_improvement,
        is_active,
        deactivated_at,
        deactivation_reason,
    })
}

const SELECT_COLUMNS: &str = "id, pattern_id, type, before_config, after_config, applied_to_agent_id, \
     applied_to_task_type, applied_to_skill, applied_at, success_count, failure_count, avg_improvement, \
     is_active, deactivated_at, deactivation_reason";

pub fn record(conn: &Connection, adaptation: &Adaptation) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO adaptations ({SELECT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            adaptation.id.to_string(),
            adaptation.pattern_id.to_string(),
            type_to_db(adaptation.adaptation_type),
            to_json(&adaptation.before_config)?,
            to_json(&adaptation.after_config)?,
            adaptation.applied_to_agent_id,
            adaptation.applied_to_task_type,
            adaptation.applied_to_skill,
            adaptation.applied_at,
            adaptation.success_count,
            adaptation.failure_count,
            adaptation.avg_improvement,
            adaptation.is_active,
            adaptation.deactivated_at,
            adaptation.deactivation_reason,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: AdaptationId) -> Result<Adaptation> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM adaptations WHERE id = ?1"),
            params![id.to_string()],
            row_to_adaptation,
        )
        .optional()?;
    match row {
        Some(row) => assemble(row),
        None => Err(error::not_found(format!("adaptation '{id}' not found"))),
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct AdaptationFilter {
    pub pattern_id: Option<PatternId>,
    pub applied_to_agent_id: Option<String>,
    pub applied_to_task_type: Option<String>,
    pub applied_to_skill: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn query(conn: &Connection, filter: AdaptationFilter) -> Result<Vec<Adaptation>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(v) = filter.pattern_id {
        clauses.push("pattern_id = ?".to_string());
        values.push(Box::new(v.to_string()));
    }
    if let Some(v) = filter.applied_to_agent_id.clone() {
        clauses.push("applied_to_agent_id = ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.applied_to_task_type.clone() {
        clauses.push("applied_to_task_type = ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.applied_to_skill.clone() {
        clauses.push("applied_to_skill = ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.is_active {
        clauses.push("is_active = ?".to_string());
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
        "SELECT {SELECT_COLUMNS} FROM adaptations {where_clause} ORDER BY applied_at DESC LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), row_to_adaptation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

pub fn update_outcome(conn: &Connection, id: AdaptationId, success: bool, improvement: Option<f64>) -> Result<Adaptation> {
    let mut adaptation = get(conn, id)?;
    adaptation.record_outcome(success, improvement);
    conn.execute(
        "UPDATE adaptations SET success_count = ?2, failure_count = ?3, avg_improvement = ?4 WHERE id = ?1",
        params![
            adaptation.id.to_string(),
            adaptation.success_count,
            adaptation.failure_count,
            adaptation.avg_improvement,
        ],
    )?;
    Ok(adaptation)
}

pub fn deactivate(conn: &Connection, id: AdaptationId, at: i64, reason: &str) -> Result<Adaptation> {
    let mut adaptation = get(conn, id)?;
    adaptation.deactivate(at, reason);
    conn.execute(
        "UPDATE adaptations SET is_active = 0, deactivated_at = ?2, deactivation_reason = ?3 WHERE id = ?1",
        params![adaptation.id.to_string(), adaptation.deactivated_at, adaptation.deactivation_reason],
    )?;
    Ok(adaptation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use evotrace_types::PatternId;

    fn sample(pattern_id: PatternId) -> Adaptation {
        Adaptation {
            id: AdaptationId::new(),
            pattern_id,
            adaptation_type: AdaptationType::Prompt,
            before_config: serde_json::json!({"temp": 0.7}),
            after_config: serde_json::json!({"temp": 0.4}),
            applied_to_agent_id: Some("agent-1".to_string()),
            applied_to_task_type: None,
            applied_to_skill: None,
            applied_at: 0,
            success_count: 0,
            failure_count: 0,
            avg_improvement: 0.0,
            is_active: true,
            deactivated_at: None,
            deactivation_reason: None,
        }
    }

    #[test]
    fn update_outcome_maintains_running_average() {
        let db = Database::open_in_memory().unwrap();
        let adaptation = sample(PatternId::new());
        record(db.connection(), &adaptation).unwrap();
        update_outcome(db.connection(), adaptation.id, true, Some(0.2)).unwrap();
        let second = update_outcome(db.connection(), adaptation.id, true, Some(0.4)).unwrap();
        assert_eq!(second.success_count, 2);
        assert!((second.avg_improvement - 0.3).abs() < 1e-9);
    }

    #[test]
    fn deactivate_records_reason() {
        let db = Database::open_in_memory().unwrap();
        let adaptation = sample(PatternId::new());
        record(db.connection(), &adaptation).unwrap();
        let deactivated = deactivate(db.connection(), adaptation.id, 100, "regressed").unwrap();
        assert!(!deactivated.is_active);
        assert_eq!(deactivated.deactivation_reason.as_deref(), Some("regressed"));
    }
}
