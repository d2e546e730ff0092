//! Schema versions, applied in order and recorded in `_migrations`.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

const MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "create_parse_jobs",
        "CREATE TABLE IF NOT EXISTS parse_jobs (
            id TEXT PRIMARY KEY NOT NULL,
            status TEXT NOT NULL,
            record TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_parse_jobs_status ON parse_jobs(status);
        CREATE INDEX IF NOT EXISTS idx_parse_jobs_expires_at ON parse_jobs(expires_at);",
    ),
    (
        2,
        "create_draft_snapshots",
        "CREATE TABLE IF NOT EXISTS draft_snapshots (
            key TEXT PRIMARY KEY NOT NULL,
            draft_id TEXT,
            content TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    ),
];

pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for &(version, description, sql) in MIGRATIONS.iter().filter(|m| m.0 > applied) {
        log::info!("Applying schema v{}: {}", version, description);
        conn.execute_batch(sql)
            .map_err(|e| DatabaseError::Migration {
                version,
                reason: e.to_string(),
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            params![version, description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_db_gets_every_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
        conn.execute(
            "INSERT INTO parse_jobs (id, status, record, created_at, expires_at)
             VALUES ('j', 'pending', '{}', 'now', 10)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();
        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_versions_are_ascending() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
