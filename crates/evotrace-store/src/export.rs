use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::repo::{adaptations, adaptations::AdaptationFilter, patterns, patterns::PatternFilter, spans, spans::SpanFilter};
use crate::util::now_ms;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportFilter {
    pub spans: SpanFilter,
    pub patterns: PatternFilter,
    pub adaptations: AdaptationFilter,
}

#[derive(Debug, Serialize)]
pub struct ExportSummary {
    pub span_count: usize,
    pub pattern_count: usize,
    pub adaptation_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExportPayload {
    pub exported_at: i64,
    pub filter: ExportFilter,
    pub summary: ExportSummary,
    pub spans: Vec<evotrace_types::Span>,
    pub patterns: Vec<evotrace_types::Pattern>,
    pub adaptations: Vec<evotrace_types::Adaptation>,
}

fn collect(conn: &Connection, filter: ExportFilter) -> Result<ExportPayload> {
    let spans = spans::query(conn, filter.spans.clone())?;
    let patterns = patterns::query(conn, filter.patterns.clone())?;
    let adaptations = adaptations::query(conn, filter.adaptations.clone())?;
    let summary = ExportSummary {
        span_count: spans.len(),
        pattern_count: patterns.len(),
        adaptation_count: adaptations.len(),
    };
    Ok(ExportPayload {
        exported_at: now_ms(),
        filter,
        summary,
        spans,
        patterns,
        adaptations,
    })
}

/// Portable JSON export with `exportedAt`, a filter echo, summary counts,
/// and per-table rows.
pub fn export_json(conn: &Connection, filter: ExportFilter) -> Result<String> {
    let payload = collect(conn, filter)?;
    crate::util::to_json(&payload)
}

fn iso8601(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Delimited CSV with one section per table (`# SPANS`, `# PATTERNS`,
/// `# ADAPTATIONS`), ISO-8601 timestamps.
pub fn export_csv(conn: &Connection, filter: ExportFilter) -> Result<String> {
    let payload = collect(conn, filter)?;
    let mut out = String::new();

    out.push_str("# SPANS\n");
    out.push_str("span_id,trace_id,task_id,execution_id,name,kind,status,start_time,end_time,duration_ms\n");
    for span in &payload.spans {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            span.span_id,
            span.trace_id,
            span.task_id,
            span.execution_id,
            csv_escape(&span.name),
            span_kind_str(span.kind),
            span.status.code.as_str(),
            iso8601(span.start_time),
            span.end_time.map(iso8601).unwrap_or_default(),
            span.duration_ms.map(|d| d.to_string()).unwrap_or_default(),
        ));
    }

    out.push_str("\n# PATTERNS\n");
    out.push_str("id,type,confidence,occurrences,applies_to_agent_type,applies_to_task_type,is_active,first_observed,last_observed\n");
    for pattern in &payload.patterns {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            pattern.id,
            pattern.pattern_type.as_str(),
            pattern.confidence,
            pattern.occurrences,
            pattern.applies_to_agent_type.as_deref().unwrap_or(""),
            pattern.applies_to_task_type.as_deref().unwrap_or(""),
            pattern.is_active,
            iso8601(pattern.first_observed),
            iso8601(pattern.last_observed),
        ));
    }

    out.push_str("\n# ADAPTATIONS\n");
    out.push_str("id,pattern_id,type,applied_to_agent_id,applied_at,success_count,failure_count,avg_improvement,is_active\n");
    for adaptation in &payload.adaptations {
        out.push_str(&format!(
            "{},{},{:?},{},{},{},{},{},{}\n",
            adaptation.id,
            adaptation.pattern_id,
            adaptation_type_str(adaptation.adaptation_type),
            adaptation.applied_to_agent_id.as_deref().unwrap_or(""),
            iso8601(adaptation.applied_at),
            adaptation.success_count,
            adaptation.failure_count,
            adaptation.avg_improvement,
            adaptation.is_active,
        ));
    }

    Ok(out)
}

fn span_kind_str(kind: evotrace_types::SpanKind) -> &'static str {
    use evotrace_types::SpanKind::*;
    match kind {
        Internal => "internal",
        Client => "client",
        Server => "server",
        Producer => "producer",
        Consumer => "consumer",
    }
}

fn adaptation_type_str(t: evotrace_types::AdaptationType) -> &'static str {
    use evotrace_types::AdaptationType::*;
    match t {
        Config => "config",
        Prompt => "prompt",
        Strategy => "strategy",
        Resource => "resource",
        Skill => "skill",
    }
}

fn csv_escape(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
