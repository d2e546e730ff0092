//! Snapshot repository: one row per storage key in `draft_snapshots`.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub key: String,
    pub draft_id: Option<String>,
    /// Serialized JSON content.
    pub content: String,
    pub updated_at: i64,
}

/// Writes the snapshot for `row.key`, overwriting any previous one.
pub fn put(db: &Database, row: &SnapshotRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO draft_snapshots (key, draft_id, content, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                draft_id = excluded.draft_id,
                content = excluded.content,
                updated_at = excluded.updated_at",
            params![row.key, row.draft_id, row.content, row.updated_at],
        )?;
        Ok(())
    })
}

pub fn get(db: &Database, key: &str) -> Result<Option<SnapshotRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT key, draft_id, content, updated_at FROM draft_snapshots WHERE key = ?1",
                params![key],
                |r| {
                    Ok(SnapshotRow {
                        key: r.get(0)?,
                        draft_id: r.get(1)?,
                        content: r.get(2)?,
                        updated_at: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

pub fn delete(db: &Database, key: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let n = conn.execute("DELETE FROM draft_snapshots WHERE key = ?1", params![key])?;
        Ok(n > 0)
    })
}
