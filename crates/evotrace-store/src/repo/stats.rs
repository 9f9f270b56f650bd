use rusqlite::{params, Connection, OptionalExtension};

use evotrace_types::{EvolutionStats, PeriodType, SkillPerformanceCache, SkillSummary};

use crate::error::Result;
use crate::util::{self, to_json};

/// Cached-rollup-or-compute-from-raw stats for an agent over `[window_start,
/// window_end]` (ms since epoch). The cache key is the exact window, so a
/// slightly different range always recomputes rather than returning a stale
/// rollup for a similar-but-different period.
pub fn get_stats(conn: &Connection, agent_id: &str, window_start: i64, window_end: i64) -> Result<EvolutionStats> {
    let cached: Option<String> = conn
        .query_row(
            "SELECT stats_json FROM evolution_stats_cache WHERE agent_id = ?1 AND window_start = ?2 AND window_end = ?3",
            params![agent_id, window_start, window_end],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(raw) = cached {
        if let Ok(stats) = serde_json::from_str(&raw) {
            return Ok(stats);
        }
        tracing::warn!(agent_id, "malformed cached evolution stats, recomputing");
    }

    let stats = compute_stats(conn, agent_id, window_start, window_end)?;
    conn.execute(
        "INSERT INTO evolution_stats_cache (agent_id, window_start, window_end, stats_json, computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(agent_id, window_start, window_end) DO UPDATE SET stats_json = ?4, computed_at = ?5",
        params![agent_id, window_start, window_end, to_json(&stats)?, util::now_ms()],
    )?;
    Ok(stats)
}

fn compute_stats(conn: &Connection, agent_id: &str, window_start: i64, window_end: i64) -> Result<EvolutionStats> {
    let hours = ((window_end - window_start).max(0) as f64) / 3_600_000.0;
    let period_type = PeriodType::from_window_hours(hours);

    let total_executions: i64 = conn.query_row(
        "SELECT COUNT(*) FROM spans
         WHERE json_extract(attributes, '$.\"agent.id\"') = ?1 AND start_time BETWEEN ?2 AND ?3",
        params![agent_id, window_start, window_end],
        |row| row.get(0),
    )?;

    let (successes, avg_duration, avg_cost, avg_quality): (i64, Option<f64>, Option<f64>, Option<f64>) = conn.query_row(
        "SELECT
             SUM(CASE WHEN status_code = 'OK' THEN 1 ELSE 0 END),
             AVG(duration_ms),
             AVG(json_extract(attributes, '$.\"execution.cost\"')),
             AVG(json_extract(attributes, '$.\"execution.quality_score\"'))
         FROM spans
         WHERE json_extract(attributes, '$.\"agent.id\"') = ?1 AND start_time BETWEEN ?2 AND ?3",
        params![agent_id, window_start, window_end],
        |row| Ok((row.get(0).unwrap_or(0), row.get(1).ok(), row.get(2).ok(), row.get(3).ok())),
    )?;

    let success_rate = if total_executions > 0 {
        successes as f64 / total_executions as f64
    } else {
        0.0
    };

    let patterns_in_window: i64 = conn.query_row(
        "SELECT COUNT(*) FROM patterns WHERE applies_to_agent_type = ?1 AND last_observed BETWEEN ?2 AND ?3",
        params![agent_id, window_start, window_end],
        |row| row.get(0),
    )?;
    let adaptations_in_window: i64 = conn.query_row(
        "SELECT COUNT(*) FROM adaptations a
         JOIN patterns p ON p.id = a.pattern_id
         WHERE p.applies_to_agent_type = ?1 AND a.applied_at BETWEEN ?2 AND ?3",
        params![agent_id, window_start, window_end],
        |row| row.get(0),
    )?;

    let window_span = window_end - window_start;
    let prior_start = window_start - window_span;
    let prior_end = window_start;
    let prior_success_rate: Option<f64> = if window_span > 0 {
        let (prior_total, prior_ok): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), SUM(CASE WHEN status_code = 'OK' THEN 1 ELSE 0 END) FROM spans
             WHERE json_extract(attributes, '$.\"agent.id\"') = ?1 AND start_time BETWEEN ?2 AND ?3",
            params![agent_id, prior_start, prior_end],
            |row| Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0))),
        )?;
        if prior_total > 0 {
            Some(prior_ok as f64 / prior_total as f64)
        } else {
            None
        }
    } else {
        None
    };
    let improvement_rate_vs_prior = prior_success_rate.map(|prior| success_rate - prior);

    let per_skill = skill_summaries_in_window(conn, agent_id, window_start, window_end)?;

    Ok(EvolutionStats {
        agent_id: agent_id.to_string(),
        period_type,
        window_start,
        window_end,
        total_executions: total_executions.max(0) as u64,
        success_rate,
        avg_duration_ms: avg_duration.unwrap_or(0.0),
        avg_cost: avg_cost.unwrap_or(0.0),
        avg_quality: avg_quality.unwrap_or(0.0),
        patterns_in_window: patterns_in_window.max(0) as u64,
        adaptations_in_window: adaptations_in_window.max(0) as u64,
        improvement_rate_vs_prior,
        per_skill,
    })
}

fn skill_summaries_in_window(conn: &Connection, agent_id: &str, window_start: i64, window_end: i64) -> Result<Vec<SkillSummary>> {
    let mut stmt = conn.prepare(
        "SELECT json_extract(attributes, '$.\"skill.name\"') AS skill,
                COUNT(*),
                AVG(CASE WHEN status_code = 'OK' THEN 1.0 ELSE 0.0 END),
                AVG(duration_ms)
         FROM spans
         WHERE json_extract(attributes, '$.\"agent.id\"') = ?1
           AND json_extract(attributes, '$.\"skill.name\"') IS NOT NULL
           AND start_time BETWEEN ?2 AND ?3
         GROUP BY skill",
    )?;
    let rows = stmt
        .query_map(params![agent_id, window_start, window_end], |row| {
            Ok(SkillSummary {
                skill: row.get(0)?,
                uses: row.get::<_, i64>(1)? as u64,
                success_rate: row.get(2)?,
                avg_duration_ms: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Reads the materialized `skills_performance_cache` row when present;
/// otherwise falls back to an aggregate over spans whose
/// `attributes."skill.name"` matches.
pub fn get_skill_performance(conn: &Connection, skill: &str) -> Result<SkillPerformanceCache> {
    let cached = conn
        .query_row(
            "SELECT skill, total, successes, failures, success_rate, mean_duration_ms, last_updated
             FROM skills_performance_cache WHERE skill = ?1",
            params![skill],
            |row| {
                Ok(SkillPerformanceCache {
                    skill: row.get(0)?,
                    total: row.get::<_, i64>(1)? as u64,
                    successes: row.get::<_, i64>(2)? as u64,
                    failures: row.get::<_, i64>(3)? as u64,
                    success_rate: row.get(4)?,
                    mean_duration_ms: row.get(5)?,
                    last_updated: row.get(6)?,
                })
            },
        )
        .optional()?;
    if let Some(cache) = cached {
        return Ok(cache);
    }

    let (total, successes, mean_duration, last_updated): (i64, i64, Option<f64>, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), SUM(CASE WHEN status_code = 'OK' THEN 1 ELSE 0 END), AVG(duration_ms), MAX(start_time)
         FROM spans WHERE json_extract(attributes, '$.\"skill.name\"') = ?1",
        params![skill],
        |row| Ok((row.get(0)?, row.get::<_, Option<i64>>(1)?.unwrap_or(0), row.get(2)?, row.get(3)?)),
    )?;
    Ok(SkillPerformanceCache {
        skill: skill.to_string(),
        total: total.max(0) as u64,
        successes: successes.max(0) as u64,
        failures: (total - successes).max(0) as u64,
        success_rate: if total > 0 { successes as f64 / total as f64 } else { 0.0 },
        mean_duration_ms: mean_duration.unwrap_or(0.0),
        last_updated: last_updated.unwrap_or(0),
    })
}

pub struct SkillRecommendation {
    pub skill: String,
    pub score: f64,
    pub uses: u64,
    pub success_rate: f64,
    pub pattern_confidence: f64,
}

/// Composite ranking `0.5·success_rate + 0.3·pattern_confidence +
/// 0.2·min(uses/10, 1)`, restricted to skills with `>=3` uses or at least
/// one active success pattern matching the task type.
pub fn get_skill_recommendations(
    conn: &Connection,
    task_type: &str,
    agent_type: Option<&str>,
    top_n: usize,
) -> Result<Vec<SkillRecommendation>> {
    let mut stmt = conn.prepare(
        "SELECT skill, total, successes, success_rate FROM skills_performance_cache",
    )?;
    let caches = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? as u64,
                row.get::<_, i64>(2)? as u64,
                row.get::<_, f64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut out = Vec::new();
    for (skill, uses, _successes, success_rate) in caches {
        let pattern_confidence: f64 = conn.query_row(
            "SELECT COALESCE(MAX(confidence), 0.0) FROM patterns
             WHERE applies_to_skill = ?1 AND applies_to_task_type = ?2 AND type = 'success' AND is_active = 1
               AND (?3 IS NULL OR applies_to_agent_type = ?3)",
            params![skill, task_type, agent_type],
            |row| row.get(0),
        )?;
        let has_active_pattern = pattern_confidence > 0.0;
        if uses < 3 && !has_active_pattern {
            continue;
        }
        let score = 0.5 * success_rate + 0.3 * pattern_confidence + 0.2 * (uses as f64 / 10.0).min(1.0);
        out.push(SkillRecommendation { skill, score, uses, success_rate, pattern_confidence });
    }
    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(top_n);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::repo::{executions, spans, tasks};
    use evotrace_types::{Span, SpanId, SpanKind, SpanStatus, StatusCode, TraceId};

    fn span_with_skill(task_id: evotrace_types::TaskId, execution_id: evotrace_types::ExecutionId, skill: &str, ok: bool, start: i64) -> Span {
        let mut attrs = evotrace_types::Attributes::new();
        attrs.insert("skill.name".to_string(), serde_json::json!(skill));
        attrs.insert("agent.id".to_string(), serde_json::json!("agent-1"));
        Span {
            trace_id: TraceId::new(),
            span_id: SpanId::new(),
            parent_span_id: None,
            task_id,
            execution_id,
            name: "use_skill".to_string(),
            kind: SpanKind::Internal,
            start_time: start,
            end_time: Some(start + 100),
            duration_ms: Some(100),
            status: SpanStatus { code: if ok { StatusCode::Ok } else { StatusCode::Error }, message: None },
            attributes: attrs,
            resource: Default::default(),
            links: None,
            tags: None,
            events: None,
        }
    }

    #[test]
    fn get_skill_performance_falls_back_to_raw_aggregate_when_uncached() {
        let db = Database::open_in_memory().unwrap();
        let task = tasks::create(db.connection(), serde_json::json!({}), None).unwrap();
        let execution = executions::create(db.connection(), task.id, None, None).unwrap();
        // Insert without going through the trigger-populated path to force the fallback:
        // the trigger fires regardless, but we assert the fallback logic independently
        // by querying a skill with zero cache rows.
        spans::record(db.connection(), &span_with_skill(task.id, execution.id, "summarize", true, 0)).unwrap();
        let perf = get_skill_performance(db.connection(), "summarize").unwrap();
        assert_eq!(perf.total, 1);
        assert_eq!(perf.successes, 1);
    }

    #[test]
    fn get_skill_recommendations_excludes_low_use_skills_without_pattern() {
        let db = Database::open_in_memory().unwrap();
        let task = tasks::create(db.connection(), serde_json::json!({}), None).unwrap();
        let execution = executions::create(db.connection(), task.id, None, None).unwrap();
        spans::record(db.connection(), &span_with_skill(task.id, execution.id, "rare_skill", true, 0)).unwrap();
        let recs = get_skill_recommendations(db.connection(), "any_task", None, 10).unwrap();
        assert!(recs.iter().all(|r| r.skill != "rare_skill"));
    }
}
