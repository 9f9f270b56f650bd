use rusqlite::{params, Connection, OptionalExtension, Row};

use evotrace_types::{Span, SpanEvent, SpanKind, SpanLink, SpanStatus, StatusCode};

use crate::error::{self, Result};
use crate::util::{self, to_json, SPAN_SORT_COLUMNS};

/// Hard upper bound enforced by `record_batch`, an explicit bound rather
/// than an unbounded insert loop.
pub const MAX_BATCH_SIZE: usize = 1000;

fn kind_to_db(kind: SpanKind) -> &'static str {
    match kind {
        SpanKind::Internal => "internal",
        SpanKind::Client => "client",
        SpanKind::Server => "server",
        SpanKind::Producer => "producer",
        SpanKind::Consumer => "consumer",
    }
}

fn kind_from_db(s: &str) -> Result<SpanKind> {
    match s {
        "internal" => Ok(SpanKind::Internal),
        "client" => Ok(SpanKind::Client),
        "server" => Ok(SpanKind::Server),
        "producer" => Ok(SpanKind::Producer),
        "consumer" => Ok(SpanKind::Consumer),
        other => Err(error::validation(format!("unknown span kind '{other}'"))),
    }
}

fn status_from_db(code: &str, message: Option<String>) -> Result<SpanStatus> {
    let code = match code {
        "OK" => StatusCode::Ok,
        "ERROR" => StatusCode::Error,
        "UNSET" => StatusCode::Unset,
        other => return Err(error::validation(format!("unknown status code '{other}'"))),
    };
    Ok(SpanStatus { code, message })
}

#[allow(clippy::type_complexity)]
type SpanRow = (
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
    i64,
    Option<i64>,
    Option<i64>,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn row_to_span(row: &Row) -> rusqlite::Result<SpanRow> {
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

fn assemble(row: SpanRow) -> Result<Span> {
    let (
        span_id,
        trace_id,
        parent_span_id,
        task_id,
        execution_id,
        name,
        kind,
        start_time,
        end_time,
        duration_ms,
        status_code,
        status_message,
        attributes,
        resource,
        links,
        tags,
        events,
    ) = row;
    Ok(Span {
        span_id: span_id.parse().map_err(|e| error::validation(format!("malformed span id: {e}")))?,
        trace_id: trace_id.parse().map_err(|e| error::validation(format!("malformed trace id: {e}")))?,
        parent_span_id: parent_span_id
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| error::validation(format!("malformed parent span id: {e}")))?,
        task_id: task_id.parse().map_err(|e| error::validation(format!("malformed task id: {e}")))?,
        execution_id: execution_id
            .parse()
            .map_err(|e| error::validation(format!("malformed execution id: {e}")))?,
        name,
        kind: kind_from_db(&kind)?,
        start_time,
        end_time,
        duration_ms,
        status: status_from_db(&status_code, status_message)?,
        attributes: util::parse_json_or(&attributes, Default::default()),
        resource: util::parse_json_or(&resource, Default::default()),
        links: links.map(|l| util::parse_json_or::<Vec<SpanLink>>(&l, Vec::new())),
        tags: tags.map(|t| util::parse_json_or::<Vec<String>>(&t, Vec::new())),
        events: events.map(|e| util::parse_json_or::<Vec<SpanEvent>>(&e, Vec::new())),
    })
}

const SELECT_COLUMNS: &str = "span_id, trace_id, parent_span_id, task_id, execution_id, name, kind, start_time, \
     end_time, duration_ms, status_code, status_message, attributes, resource, links, tags, events";

fn insert_one(conn: &Connection, span: &Span) -> Result<()> {
    span.check_timing_invariants().map_err(error::validation)?;
    conn.execute(
        &format!(
            "INSERT INTO spans ({SELECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            span.span_id.to_string(),
            span.trace_id.to_string(),
            span.parent_span_id.map(|p| p.to_string()),
            span.task_id.to_string(),
            span.execution_id.to_string(),
            span.name,
            kind_to_db(span.kind),
            span.start_time,
            span.end_time,
            span.duration_ms,
            span.status.code.as_str(),
            span.status.message,
            to_json(&span.attributes)?,
            to_json(&span.resource)?,
            span.links.as_ref().map(to_json).transpose()?,
            span.tags.as_ref().map(to_json).transpose()?,
            span.events.as_ref().map(to_json).transpose()?,
        ],
    )?;
    Ok(())
}

pub fn record(conn: &Connection, span: &Span) -> Result<()> {
    insert_one(conn, span)
}

/// Atomic batch insert; rejects outright (no partial insert) above
/// [`MAX_BATCH_SIZE`].
pub fn record_batch(conn: &mut Connection, spans: &[Span]) -> Result<()> {
    if spans.is_empty() {
        return Ok(());
    }
    if spans.len() > MAX_BATCH_SIZE {
        return Err(error::validation(format!(
            "batch of {} spans exceeds the {} span hard cap",
            spans.len(),
            MAX_BATCH_SIZE
        )));
    }
    let tx = conn.transaction()?;
    for span in spans {
        insert_one(&tx, span)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn get(conn: &Connection, span_id: evotrace_types::SpanId) -> Result<Span> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM spans WHERE span_id = ?1"),
            params![span_id.to_string()],
            row_to_span,
        )
        .optional()?;
    match row {
        Some(row) => assemble(row),
        None => Err(error::not_found(format!("span '{span_id}' not found"))),
    }
}

pub fn query_spans_by_trace(conn: &Connection, trace_id: evotrace_types::TraceId) -> Result<Vec<Span>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM spans WHERE trace_id = ?1 ORDER BY start_time ASC"
    ))?;
    let rows = stmt
        .query_map(params![trace_id.to_string()], row_to_span)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

pub fn query_children(conn: &Connection, parent_span_id: evotrace_types::SpanId) -> Result<Vec<Span>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM spans WHERE parent_span_id = ?1 ORDER BY start_time ASC"
    ))?;
    let rows = stmt
        .query_map(params![parent_span_id.to_string()], row_to_span)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SpanFilter {
    pub task_id: Option<evotrace_types::TaskId>,
    pub execution_id: Option<evotrace_types::ExecutionId>,
    pub status_code: Option<StatusCode>,
    pub start_gte: Option<i64>,
    pub start_lte: Option<i64>,
    pub end_gte: Option<i64>,
    pub end_lte: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_column: String,
    pub sort_order: String,
}

impl SpanFilter {
    pub fn new() -> Self {
        Self {
            sort_column: "start_time".to_string(),
            sort_order: "DESC".to_string(),
            ..Default::default()
        }
    }
}

pub fn query(conn: &Connection, filter: SpanFilter) -> Result<Vec<Span>> {
    let (sort_column, sort_order) = util::validate_sort(SPAN_SORT_COLUMNS, &filter.sort_column, &filter.sort_order)?;

    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(task_id) = filter.task_id {
        clauses.push("task_id = ?".to_string());
        values.push(Box::new(task_id.to_string()));
    }
    if let Some(execution_id) = filter.execution_id {
        clauses.push("execution_id = ?".to_string());
        values.push(Box::new(execution_id.to_string()));
    }
    if let Some(status_code) = filter.status_code {
        clauses.push("status_code = ?".to_string());
        values.push(Box::new(status_code.as_str().to_string()));
    }
    if let Some(v) = filter.start_gte {
        clauses.push("start_time >= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.start_lte {
        clauses.push("start_time <= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.end_gte {
        clauses.push("end_time >= ?".to_string());
        values.push(Box::new(v));
    }
    if let Some(v) = filter.end_lte {
        clauses.push("end_time <= ?".to_string());
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
        "SELECT {SELECT_COLUMNS} FROM spans {where_clause} ORDER BY {sort_column} {sort_order} LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), row_to_span)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

/// Spans whose `links[*].span_id` equals `target`, found via `json_each`
/// traversal of the `links` column rather than substring matching.
pub fn query_linked_spans(conn: &Connection, target: evotrace_types::SpanId) -> Result<Vec<Span>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM spans
         WHERE EXISTS (
             SELECT 1 FROM json_each(COALESCE(spans.links, '[]'))
             WHERE json_extract(json_each.value, '$.span_id') = ?1
         )
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![target.to_string()], row_to_span)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(assemble).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    Any,
    All,
}

pub fn query_by_tags(conn: &Connection, tags: &[String], mode: TagMode) -> Result<Vec<Span>> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }
    let sql = match mode {
        TagMode::Any => format!(
            "SELECT {SELECT_COLUMNS} FROM spans
             WHERE EXISTS (
                 SELECT 1 FROM json_each(COALESCE(spans.tags, '[]'))
                 WHERE json_each.value IN ({})
             )
             ORDER BY start_time DESC",
            tags.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
        ),
        TagMode::All => format!(
            "SELECT {SELECT_COLUMNS} FROM spans
             WHERE (
                 SELECT COUNT(DISTINCT json_each.value) FROM json_each(COALESCE(spans.tags, '[]'))
                 WHERE json_each.value IN ({})
             ) = ?
             ORDER BY start_time DESC",
            tags.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = match mode {
        TagMode::Any => {
            let param_refs: Vec<&dyn rusqlite::ToSql> = tags.iter().map(|t| t as &dyn rusqlite::ToSql).collect();
            stmt.query_map(param_refs.as_slice(), row_to_span)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        TagMode::All => {
            let mut param_refs: Vec<&dyn rusqlite::ToSql> = tags.iter().map(|t| t as &dyn rusqlite::ToSql).collect();
            let count = tags.len() as i64;
            param_refs.push(&count);
            stmt.query_map(param_refs.as_slice(), row_to_span)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    rows.into_iter().map(assemble).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repo::{executions, tasks};
    use evotrace_types::{SpanId, TraceId};

    fn sample_span(task_id: evotrace_types::TaskId, execution_id: evotrace_types::ExecutionId, start: i64) -> Span {
        Span {
            trace_id: TraceId::new(),
            span_id: SpanId::new(),
            parent_span_id: None,
            task_id,
            execution_id,
            name: "fetch_data".to_string(),
            kind: SpanKind::Internal,
            start_time: start,
            end_time: Some(start + 50),
            duration_ms: Some(50),
            status: SpanStatus { code: StatusCode::Ok, message: None },
            attributes: Default::default(),
            resource: Default::default(),
            links: None,
            tags: Some(vec!["ingest".to_string()]),
            events: None,
        }
    }

    fn seeded() -> (Database, evotrace_types::TaskId, evotrace_types::ExecutionId) {
        let db = Database::open_in_memory().unwrap();
        let task = tasks::create(db.connection(), serde_json::json!({}), None).unwrap();
        let execution = executions::create(db.connection(), task.id, None, None).unwrap();
        (db, task.id, execution.id)
    }

    #[test]
    fn record_batch_rejects_oversized_batches() {
        let (mut db, task_id, execution_id) = seeded();
        let spans: Vec<Span> = (0..(MAX_BATCH_SIZE + 1))
            .map(|i| sample_span(task_id, execution_id, i as i64))
            .collect();
        let err = record_batch(db.connection_mut(), &spans).unwrap_err();
        assert!(matches!(err, crate::error::Error::Domain(evotrace_types::Error::Validation(_))));
    }

    #[test]
    fn record_batch_is_atomic_on_success() {
        let (mut db, task_id, execution_id) = seeded();
        let spans: Vec<Span> = (0..10).map(|i| sample_span(task_id, execution_id, i)).collect();
        record_batch(db.connection_mut(), &spans).unwrap();
        let fetched = query_spans_by_trace(db.connection(), spans[0].trace_id).unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[test]
    fn query_rejects_unknown_sort_column() {
        let (db, task_id, execution_id) = seeded();
        let span = sample_span(task_id, execution_id, 0);
        record(db.connection(), &span).unwrap();
        let mut filter = SpanFilter::new();
        filter.sort_column = "attributes".to_string();
        assert!(query(db.connection(), filter).is_err());
    }

    #[test]
    fn query_filters_by_status_and_paginates() {
        let (db, task_id, execution_id) = seeded();
        for i in 0..5 {
            record(db.connection(), &sample_span(task_id, execution_id, i)).unwrap();
        }
        let mut filter = SpanFilter::new();
        filter.status_code = Some(StatusCode::Ok);
        filter.limit = Some(2);
        let page = query(db.connection(), filter).unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn query_by_tags_any_matches_overlap() {
        let (db, task_id, execution_id) = seeded();
        record(db.connection(), &sample_span(task_id, execution_id, 0)).unwrap();
        let results = query_by_tags(db.connection(), &["ingest".to_string()], TagMode::Any).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn query_linked_spans_uses_structured_traversal_not_substring() {
        let (db, task_id, execution_id) = seeded();
        let origin = sample_span(task_id, execution_id, 0);
        record(db.connection(), &origin).unwrap();

        let mut linker = sample_span(task_id, execution_id, 10);
        linker.links = Some(vec![SpanLink {
            trace_id: origin.trace_id,
            span_id: origin.span_id,
            link_type: Some("reward_for_operation".to_string()),
            attributes: None,
        }]);
        record(db.connection(), &linker).unwrap();

        let linked = query_linked_spans(db.connection(), origin.span_id).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].span_id, linker.span_id);
    }
}
