use rusqlite::{params, Connection, OptionalExtension, Row};

use evotrace_types::{AbExperiment, Assignment, ExperimentId, ExperimentStatus, Metric};

use crate::error::{self, Result};
use crate::util::{self, to_json};

fn status_from_db(s: &str) -> Result<ExperimentStatus> {
    match s {
        "draft" => Ok(ExperimentStatus::Draft),
        "running" => Ok(ExperimentStatus::Running),
        "completed" => Ok(ExperimentStatus::Completed),
        other => Err(error::validation(format!("unknown experiment status '{other}'"))),
    }
}

fn status_to_db(s: ExperimentStatus) -> &'static str {
    match s {
        ExperimentStatus::Draft => "draft",
        ExperimentStatus::Running => "running",
        ExperimentStatus::Completed => "completed",
    }
}

type ExperimentRow = (String, String, String, String, String, u64, f64, String, i64);

fn row_to_experiment(row: &Row) -> rusqlite::Result<ExperimentRow> {
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

fn assemble(row: ExperimentRow) -> Result<AbExperiment> {
    let (id, name, variants, traffic_split, success_metric, min_sample_size, significance_level, status, created_at) = row;
    Ok(AbExperiment {
        id: id.parse().map_err(|e| error::validation(format!("malformed experiment id: {e}")))?,
        name,
        variants: util::parse_json_required(&variants, "variants")?,
        traffic_split: util::parse_json_required(&traffic_split, "traffic_split")?,
        success_metric,
        min_sample_size,
        significance_level,
        status: status_from_db(&status)?,
        created_at,
    })
}

const SELECT_COLUMNS: &str =
    "id, name, variants, traffic_split, success_metric, min_sample_size, significance_level, status, created_at";

pub fn create_experiment(conn: &Connection, experiment: &AbExperiment) -> Result<()> {
    experiment.check_invariants().map_err(error::validation)?;
    conn.execute(
        &format!("INSERT INTO ab_experiments ({SELECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            experiment.id.to_string(),
            experiment.name,
            to_json(&experiment.variants)?,
            to_json(&experiment.traffic_split)?,
            experiment.success_metric,
            experiment.min_sample_size,
            experiment.significance_level,
            status_to_db(experiment.status),
            experiment.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_experiment(conn: &Connection, id: ExperimentId) -> Result<AbExperiment> {
    let row = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM ab_experiments WHERE id = ?1"),
            params![id.to_string()],
            row_to_experiment,
        )
        .optional()?;
    match row {
        Some(row) => assemble(row),
        None => Err(error::not_found(format!("experiment '{id}' not found"))),
    }
}

pub fn set_status(conn: &Connection, id: ExperimentId, status: ExperimentStatus) -> Result<AbExperiment> {
    conn.execute(
        "UPDATE ab_experiments SET status = ?2 WHERE id = ?1",
        params![id.to_string(), status_to_db(status)],
    )?;
    get_experiment(conn, id)
}

/// Idempotent by `(experiment_id, subject_id)`: if an assignment already
/// exists it is returned unchanged, never recomputed.
pub fn get_assignment(conn: &Connection, experiment_id: ExperimentId, subject_id: &str) -> Result<Option<Assignment>> {
    conn.query_row(
        "SELECT experiment_id, subject_id, variant, assigned_at FROM ab_assignments
         WHERE experiment_id = ?1 AND subject_id = ?2",
        params![experiment_id.to_string(), subject_id],
        |row| {
            Ok(Assignment {
                experiment_id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
                subject_id: row.get(1)?,
                variant: row.get(2)?,
                assigned_at: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(Into::into)
}

pub fn insert_assignment(conn: &Connection, assignment: &Assignment) -> Result<()> {
    conn.execute(
        "INSERT INTO ab_assignments (experiment_id, subject_id, variant, assigned_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(experiment_id, subject_id) DO NOTHING",
        params![
            assignment.experiment_id.to_string(),
            assignment.subject_id,
            assignment.variant,
            assignment.assigned_at,
        ],
    )?;
    Ok(())
}

pub fn record_metric(conn: &Connection, metric: &Metric) -> Result<()> {
    conn.execute(
        "INSERT INTO ab_metrics (experiment_id, variant, subject_id, success_metric_value, secondary, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            metric.experiment_id.to_string(),
            metric.variant,
            metric.subject_id,
            metric.success_metric_value,
            metric.secondary.as_ref().map(to_json).transpose()?,
            metric.recorded_at,
        ],
    )?;
    Ok(())
}

pub fn metric_values(conn: &Connection, experiment_id: ExperimentId, variant: &str) -> Result<Vec<f64>> {
    let mut stmt = conn.prepare(
        "SELECT success_metric_value FROM ab_metrics WHERE experiment_id = ?1 AND variant = ?2 ORDER BY recorded_at ASC",
    )?;
    let values = stmt
        .query_map(params![experiment_id.to_string(), variant], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn sample() -> AbExperiment {
        AbExperiment {
            id: ExperimentId::new(),
            name: "prompt-v2".to_string(),
            variants: vec!["A".to_string(), "B".to_string()],
            traffic_split: vec![0.5, 0.5],
            success_metric: "quality".to_string(),
            min_sample_size: 30,
            significance_level: 0.05,
            status: ExperimentStatus::Draft,
            created_at: 0,
        }
    }

    #[test]
    fn assignment_insert_is_idempotent_via_on_conflict() {
        let db = Database::open_in_memory().unwrap();
        let experiment = sample();
        create_experiment(db.connection(), &experiment).unwrap();
        let assignment = Assignment {
            experiment_id: experiment.id,
            subject_id: "user-1".to_string(),
            variant: "A".to_string(),
            assigned_at: 0,
        };
        insert_assignment(db.connection(), &assignment).unwrap();
        let mut other = assignment.clone();
        other.variant = "B".to_string();
        insert_assignment(db.connection(), &other).unwrap();
        let stored = get_assignment(db.connection(), experiment.id, "user-1").unwrap().unwrap();
        assert_eq!(stored.variant, "A");
    }

    #[test]
    fn metric_values_orders_by_recorded_at() {
        let db = Database::open_in_memory().unwrap();
        let experiment = sample();
        create_experiment(db.connection(), &experiment).unwrap();
        record_metric(
            db.connection(),
            &Metric {
                experiment_id: experiment.id,
                variant: "A".to_string(),
                subject_id: "u1".to_string(),
                success_metric_value: 0.8,
                secondary: None,
                recorded_at: 5,
            },
        )
        .unwrap();
        let values = metric_values(db.connection(), experiment.id, "A").unwrap();
        assert_eq!(values, vec![0.8]);
    }
}
