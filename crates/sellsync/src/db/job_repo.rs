//! Job repository: row-level access to the `parse_jobs` table.
//!
//! The full job record is stored as a JSON document in `record`, so a write
//! always replaces the whole record in one statement.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub status: String,
    pub record: String,
    pub created_at: String,
    /// Epoch millis after which the row is treated as gone.
    pub expires_at: Option<i64>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            record: row.get("record")?,
            created_at: row.get("created_at")?,
            expires_at: row.get("expires_at")?,
        })
    }
}

/// Inserts or replaces a job row. An existing expiry is left untouched.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO parse_jobs (id, status, record, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, record = excluded.record",
            params![job.id, job.status, job.record, job.created_at, job.expires_at],
        )?;
        Ok(())
    })
}

/// Finds a job that has not expired as of `now_ms`.
pub fn find_live(db: &Database, id: &str, now_ms: i64) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM parse_jobs
                 WHERE id = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![id, now_ms],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Deletes a job row. Returns whether a row was removed.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute("DELETE FROM parse_jobs WHERE id = ?1", params![id])?;
        Ok(n > 0)
    })
}

/// Sets the expiry deadline of a job. Returns whether the job exists.
pub fn set_expiry(db: &Database, id: &str, expires_at_ms: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute(
            "UPDATE parse_jobs SET expires_at = ?2 WHERE id = ?1",
            params![id, expires_at_ms],
        )?;
        Ok(n > 0)
    })
}

/// Removes every row whose deadline has passed. Returns the number removed.
pub fn purge_expired(db: &Database, now_ms: i64) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute(
            "DELETE FROM parse_jobs WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_ms],
        )?;
        Ok(n)
    })
}

pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let n: u64 = conn.query_row(
            "SELECT COUNT(*) FROM parse_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(n)
    })
}
