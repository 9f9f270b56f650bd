use rusqlite::{params, Connection, Row};

use evotrace_types::{FeedbackType, Reward, RewardId, SpanId};

use crate::error::{self, Result};
use crate::util::{self, to_json};

fn feedback_type_from_db(s: &str) -> Result<FeedbackType> {
    match s {
        "user" => Ok(FeedbackType::User),
        "automated" => Ok(FeedbackType::Automated),
        "expert" => Ok(FeedbackType::Expert),
        other => Err(error::validation(format!("unknown feedback type '{other}'"))),
    }
}

fn feedback_type_to_db(t: FeedbackType) -> &'static str {
    match t {
        FeedbackType::User => "user",
        FeedbackType::Automated => "automated",
        FeedbackType::Expert => "expert",
    }
}

#[allow(clippy::type_complexity)]
type RewardRow = (String, String, f64, Option<String>, Option<String>, Option<String>, Option<String>, i64, Option<String>);

fn row_to_reward(row: &Row) -> rusqlite::Result<RewardRow> {
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
    ))
}

fn assemble(row: RewardRow) -> Result<Reward> {
    let (id, operation_span_id, value, dimensions, feedback, feedback_type, provided_by, provided_at, metadata) = row;
    Ok(Reward {
        id: id.parse().map_err(|e| error::validation(format!("malformed reward id: {e}")))?,
        operation_span_id: operation_span_id
            .parse()
            .map_err(|e| error::validation(format!("malformed span id: {e}")))?,
        value,
        dimensions: dimensions.map(|d| util::parse_json_or(&d, Default::default())),
        feedback,
        feedback_type: feedback_type.map(|f| feedback_type_from_db(&f)).transpose()?,
        provided_by,
        provided_at,
        metadata: metadata.map(|m| util::parse_json_or(&m, serde_json::Value::Null)),
    })
}

const SELECT_COLUMNS: &str =
    "id, operation_span_id, value, dimensions, feedback, feedback_type, provided_by, provided_at, metadata";

pub fn record(conn: &Connection, reward: &Reward) -> Result<()> {
    reward.check_finite().map_err(error::validation)?;
    conn.execute(
        &format!("INSERT INTO rewards ({SELECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            reward.id.to_string(),
            reward.operation_span_id.to_string(),
            reward.value,
            reward.dimensions.as_ref().map(to_json).transpose()?,
            reward.feedback,
            reward.feedback_type.map(feedback_type_to_db),
            reward.provided_by,
            reward.provided_at,
            reward.metadata.as_ref().map(to_json).transpose()?,
        ],
    )?;
    Ok(())
}

pub fn get_for_span(conn: &Connection, span_id: SpanId) -> Result<Vec<Reward>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM rewards WHERE operation_span_id = ?1 ORDER BY provided_at ASC"
    ))?;
    let rows = stmt
        .query_map(params![span_id.to_string()], row_to_reward)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

pub fn query_by_operation_span(conn: &Connection, span_id: SpanId) -> Result<Vec<Reward>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM rewards WHERE operation_span_id = ?1 ORDER BY provided_at DESC"
    ))?;
    let rows = stmt
        .query_map(params![span_id.to_string()], row_to_reward)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

#[derive(Debug, Default, Clone)]
pub struct RewardFilter {
    pub provided_gte: Option<i64>,
    pub provided_lte: Option<i64>,
    pub value_gte: Option<f64>,
    pub value_lte: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn query(conn: &Connection, filter: RewardFilter) -> Result<Vec<Reward>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(v) = filter.provided_gte {
        clauses.push("provided_at >= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.provided_lte {
        clauses.push("provided_at <= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.value_gte {
        clauses.push("value >= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.value_lte {
        clauses.push("value <= ?".to_string());
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
        "SELECT {SELECT_COLUMNS} FROM rewards {where_clause} ORDER BY provided_at DESC LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), row_to_reward)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn sample(span_id: SpanId, value: f64, at: i64) -> Reward {
        Reward {
            id: RewardId::new(),
            operation_span_id: span_id,
            value,
            dimensions: None,
            feedback: None,
            feedback_type: Some(FeedbackType::User),
            provided_by: Some("user-1".to_string()),
            provided_at: at,
            metadata: None,
        }
    }

    #[test]
    fn record_rejects_non_finite_value() {
        let db = Database::open_in_memory().unwrap();
        let reward = sample(SpanId::new(), f64::NAN, 0);
        assert!(record(db.connection(), &reward).is_err());
    }

    #[test]
    fn get_for_span_orders_ascending() {
        let db = Database::open_in_memory().unwrap();
        let span_id = SpanId::new();
        record(db.connection(), &sample(span_id, 1.0, 20)).unwrap();
        record(db.connection(), &sample(span_id, 2.0, 10)).unwrap();
        let rewards = get_for_span(db.connection(), span_id).unwrap();
        assert_eq!(rewards[0].provided_at, 10);
        assert_eq!(rewards[1].provided_at, 20);
    }

    #[test]
    fn query_by_operation_span_orders_descending() {
        let db = Database::open_in_memory().unwrap();
        let span_id = SpanId::new();
        record(db.connection(), &sample(span_id, 1.0, 20)).unwrap();
        record(db.connection(), &sample(span_id, 2.0, 10)).unwrap();
        let rewards = query_by_operation_span(db.connection(), span_id).unwrap();
        assert_eq!(rewards[0].provided_at, 20);
        assert_eq!(rewards[1].provided_at, 10);
    }
}
