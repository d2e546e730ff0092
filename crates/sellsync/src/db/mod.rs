//! SQLite storage behind the job backend and the draft snapshot store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod snapshot_repo;

pub use error::DatabaseError;

/// Several processes may share one job file; writers wait this long for
/// the lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One connection behind a mutex. Clones share it.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens `path` in WAL mode, creating missing directories, and brings the
    /// schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| DatabaseError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self::migrated(conn)?;

        log::info!("Job and snapshot store at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked. `f` must stay synchronous.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(poisoned) => {
                log::warn!("Database lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        f(&conn)
    }
}

/// `~/.sellsync/data/sellsync.db`, used when the config names no file.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".sellsync").join("data").join("sellsync.db"))
}
