use crate::error::Result;
use rusqlite::Connection;

/// One schema change: forward DDL plus its inverse, applied/rolled back
/// together with the `schema_migrations` version row in a single transaction.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "initial_schema",
            up: include_str!("sql/001_initial_up.sql"),
            down: include_str!("sql/001_initial_down.sql"),
        },
        Migration {
            version: 2,
            name: "skill_cache_trigger",
            up: include_str!("sql/002_skill_cache_up.sql"),
            down: include_str!("sql/002_skill_cache_down.sql"),
        },
        Migration {
            version: 3,
            name: "spans_fts",
            up: include_str!("sql/003_spans_fts_up.sql"),
            down: include_str!("sql/003_spans_fts_down.sql"),
        },
        Migration {
            version: 4,
            name: "ab_experiments",
            up: include_str!("sql/004_ab_up.sql"),
            down: include_str!("sql/004_ab_down.sql"),
        },
        Migration {
            version: 5,
            name: "evolution_stats_cache",
            up: include_str!("sql/005_evolution_stats_up.sql"),
            down: include_str!("sql/005_evolution_stats_down.sql"),
        },
    ]
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );",
    )?;
    Ok(())
}

fn applied_versions(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(versions)
}

/// Apply every migration not yet recorded, in ascending version order, each
/// inside its own transaction covering both the DDL and the version insert.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    ensure_version_table(conn)?;
    let applied = applied_versions(conn)?;

    for migration in all_migrations() {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!(version = migration.version, name = migration.name, "applying migration");
        let tx = conn.transaction()?;
        tx.execute_batch(migration.up)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }
    Ok(())
}

/// Roll back down to (and excluding) `target_version`, executing inverse
/// DDL in reverse applied order. Used by tests and operational recovery.
pub fn rollback_to(conn: &mut Connection, target_version: i64) -> Result<()> {
    let applied = applied_versions(conn)?;
    let mut migrations = all_migrations();
    migrations.sort_by(|a, b| b.version.cmp(&a.version));

    for migration in migrations {
        if migration.version <= target_version || !applied.contains(&migration.version) {
            continue;
        }
        tracing::info!(version = migration.version, name = migration.name, "rolling back migration");
        let tx = conn.transaction()?;
        tx.execute_batch(migration.down)?;
        tx.execute(
            "DELETE FROM schema_migrations WHERE version = ?1",
            rusqlite::params![migration.version],
        )?;
        tx.commit()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        let first = applied_versions(&conn).unwrap();
        migrate(&mut conn).unwrap();
        let second = applied_versions(&conn).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rollback_reverses_forward_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        rollback_to(&mut conn, 0).unwrap();
        let remaining = applied_versions(&conn).unwrap();
        assert!(remaining.is_empty());
    }
}
