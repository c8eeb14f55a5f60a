//! Auth Database
//! Mission: Own the single SQLite connection shared by accounts and reset tokens

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use std::sync::Arc;
use tracing::{info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS users (
    id              TEXT    PRIMARY KEY,
    email           TEXT    UNIQUE NOT NULL COLLATE NOCASE,
    password_hash   TEXT    NOT NULL,
    first_name      TEXT    NOT NULL DEFAULT '',
    last_name       TEXT    NOT NULL DEFAULT '',
    created_at      TEXT    NOT NULL,
    updated_at      TEXT    NOT NULL,
    email_verified  INTEGER NOT NULL DEFAULT 0,
    is_active       INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS password_resets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT    NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token       TEXT    UNIQUE NOT NULL,
    expires_at  TEXT    NOT NULL,
    used        INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
CREATE INDEX IF NOT EXISTS idx_password_resets_token ON password_resets(token);
CREATE INDEX IF NOT EXISTS idx_password_resets_user ON password_resets(user_id, used);
"#;

/// Shared handle to the auth database.
///
/// Every statement goes through the one mutex-guarded connection, which is the
/// serialization point for check-then-write sequences. Multi-statement
/// operations additionally run inside `BEGIN IMMEDIATE` transactions.
#[derive(Clone)]
pub struct AuthDb {
    conn: Arc<Mutex<Connection>>,
}

impl AuthDb {
    /// Open (or create) the database file and apply the schema
    pub fn open(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open auth database at {}", db_path))?;

        let conn = Self::init(conn)?;

        info!("🔐 Auth database initialized at: {}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database, used by tests and throwaway tooling
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let conn = Self::init(conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init(conn: Connection) -> Result<Connection> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize auth schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();

        // In-memory databases report "memory" and that is fine.
        if !matches!(journal_mode.to_lowercase().as_str(), "wal" | "memory") {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        Ok(conn)
    }

    /// Run `f` with exclusive access to the connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }
}

/// Store-layer failures, already translated to the auth taxonomy where one applies
#[derive(Debug)]
pub enum StoreError {
    /// Unique constraint on the normalized email was hit
    Conflict,
    /// No unused, unexpired reset token matched
    InvalidOrExpired,
    /// Row could not be mapped back into a domain value
    Corrupt(String),
    Database(rusqlite::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict => write!(f, "email already registered"),
            StoreError::InvalidOrExpired => write!(f, "reset token invalid or expired"),
            StoreError::Corrupt(detail) => write!(f, "corrupt row: {}", detail),
            StoreError::Database(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if is_unique_violation(&e) {
            StoreError::Conflict
        } else {
            StoreError::Database(e)
        }
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

/// Fixed-width RFC 3339 form so that SQL string comparison is chronological
pub fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_db_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {:?}: {}", raw, e)))
}
