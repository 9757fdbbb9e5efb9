//! Database operations using rusqlite.
//!
//! Every worker owns its own `Database`, so concurrent requests each hold a
//! separate connection to the same file. Cross-connection correctness comes
//! from SQLite's write lock: atomic upserts, unique constraints and
//! `BEGIN IMMEDIATE` transactions. No application-level locks are involved.

use crate::ranks::Rank;
use crate::storage::schema::{
    CURRENT_VERSION, MIGRATION_V1_TO_V2, SCHEMA, SCHEMA_VERSION_TABLE,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// A platform user as seen by the gamification engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Sequential signup number, starting at 1
    pub seq: i64,
    /// Name shown on leaderboards
    pub display_name: String,
    /// Cumulative XP (never decreases)
    pub xp: i64,
    /// Denormalised rank level, written back after every XP grant
    pub rank_level: u32,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    ///
    /// `busy_timeout` bounds how long any statement waits for another
    /// connection's write lock before failing with a transient error.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::IoError(e.to_string()))?;
            }
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        // Another worker may be migrating the same file; the immediate
        // transaction serialises that.
        let tx = rusqlite::Transaction::new_unchecked(
            &self.conn,
            rusqlite::TransactionBehavior::Immediate,
        )
        .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tx.execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let current_version = Self::schema_version_of(&tx)?;
        if current_version < CURRENT_VERSION {
            Self::migrate(&tx, current_version)?;
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> Result<i32, DatabaseError> {
        Self::schema_version_of(&self.conn)
    }

    fn schema_version_of(conn: &Connection) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(conn: &Connection, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            conn.execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
            Self::record_version(conn, 1)?;
        }

        if from_version < 2 {
            conn.execute_batch(MIGRATION_V1_TO_V2)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
            Self::record_version(conn, 2)?;
        }

        tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        Ok(())
    }

    fn record_version(conn: &Connection, version: i32) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin an immediate (write-locking) transaction on a shared reference.
    ///
    /// The transaction rolls back on drop unless committed.
    pub fn immediate_transaction(&self) -> Result<rusqlite::Transaction<'_>, DatabaseError> {
        rusqlite::Transaction::new_unchecked(&self.conn, rusqlite::TransactionBehavior::Immediate)
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    // ========== User CRUD Operations ==========

    /// Insert a new user with zero XP at rank level 1.
    pub fn create_user(&self, id: Uuid, display_name: &str) -> Result<User, DatabaseError> {
        let now = Utc::now();

        self.conn
            .execute(
                "INSERT INTO users (id, display_name, xp, rank_level, created_at)
                 VALUES (?1, ?2, 0, 1, ?3)",
                params![id.to_string(), display_name, now.to_rfc3339()],
            )
            .map_err(map_write_error)?;

        self.get_user(&id)?
            .ok_or_else(|| DatabaseError::NotFound(id.to_string()))
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: &Uuid) -> Result<Option<User>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, seq, display_name, xp, rank_level, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                UserRow::from_row,
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        row.map(UserRow::into_user).transpose()
    }

    /// List all users in signup order.
    pub fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, seq, display_name, xp, rank_level, created_at
                 FROM users ORDER BY seq ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], UserRow::from_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut users = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            users.push(row.into_user()?);
        }

        Ok(users)
    }

    // ========== Rank Table Operations ==========

    /// Replace the stored rank table.
    ///
    /// Callers validate the tiers first; the unique constraints here are
    /// the last line of defence against duplicate thresholds.
    pub fn replace_ranks(&self, ranks: &[Rank]) -> Result<(), DatabaseError> {
        let tx = self.immediate_transaction()?;

        tx.execute("DELETE FROM ranks", [])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        for rank in ranks {
            tx.execute(
                "INSERT INTO ranks (level, name, min_xp) VALUES (?1, ?2, ?3)",
                params![rank.level, rank.name, rank.min_xp],
            )
            .map_err(map_write_error)?;
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))
    }

    /// Load the stored rank table ordered by threshold.
    pub fn load_ranks(&self) -> Result<Vec<Rank>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT level, name, min_xp FROM ranks ORDER BY min_xp ASC")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Rank {
                    level: row.get(0)?,
                    name: row.get(1)?,
                    min_xp: row.get(2)?,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.collect::<SqliteResult<Vec<_>>>()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }
}

/// Intermediate row struct for user queries.
struct UserRow {
    id: String,
    seq: i64,
    display_name: String,
    xp: i64,
    rank_level: u32,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &rusqlite::Row<'_>) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            seq: row.get(1)?,
            display_name: row.get(2)?,
            xp: row.get(3)?,
            rank_level: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?,
            seq: self.seq,
            display_name: self.display_name,
            xp: self.xp,
            rank_level: self.rank_level,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Parse an RFC 3339 timestamp stored as TEXT.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::DeserializationError(e.to_string()))
}

/// Map a write failure, separating constraint violations and lock timeouts
/// from other query failures.
pub(crate) fn map_write_error(e: rusqlite::Error) -> DatabaseError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => {
            DatabaseError::ConstraintViolation(e.to_string())
        }
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
            DatabaseError::Busy(e.to_string())
        }
        _ => DatabaseError::QueryFailed(e.to_string()),
    }
}

impl DatabaseError {
    /// Whether retrying later could succeed (store unreachable or locked).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_)
                | DatabaseError::IoError(_)
                | DatabaseError::Busy(_)
                | DatabaseError::TransactionFailed(_)
        )
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
