//! Per-user scores within leaderboard scopes.
//!
//! Increments are single upsert statements, so concurrent workers on
//! separate connections never lose updates. Each increment also stamps the
//! entry with a fresh `reached_seq`, giving leaderboards a stable
//! tie-break: among equal scores, whoever reached it first ranks higher.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::storage::database::{map_write_error, Database, DatabaseError};

/// Leaderboard scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// All-time totals
    Global,
    /// Totals since the last weekly reset
    Weekly,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::Global, Scope::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Scope::Global),
            "weekly" => Ok(Scope::Weekly),
            other => Err(ScoreError::UnknownScope(other.to_string())),
        }
    }
}

/// Durable score counters.
pub struct ScoreStore {
    db: Arc<Database>,
}

impl ScoreStore {
    /// Create a new score store.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Add `amount` to the user's score in `scope` and return the new total.
    pub fn increment_score(
        &self,
        user_id: Uuid,
        amount: i64,
        scope: Scope,
    ) -> Result<i64, ScoreError> {
        Self::increment_in(self.db.connection(), user_id, amount, scope)
    }

    /// Same as [`ScoreStore::increment_score`] but on a caller-supplied
    /// connection, so it can join an open transaction.
    pub(crate) fn increment_in(
        conn: &Connection,
        user_id: Uuid,
        amount: i64,
        scope: Scope,
    ) -> Result<i64, ScoreError> {
        if amount < 0 {
            return Err(ScoreError::NegativeAmount(amount));
        }

        if amount == 0 {
            return Ok(Self::score_in(conn, user_id, scope)?.unwrap_or(0));
        }

        conn.query_row(
            "INSERT INTO score_entries (user_id, scope, score, reached_seq, updated_at)
             VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(reached_seq), 0) + 1 FROM score_entries), ?4)
             ON CONFLICT(user_id, scope) DO UPDATE SET
                 score = score + excluded.score,
                 reached_seq = excluded.reached_seq,
                 updated_at = excluded.updated_at
             RETURNING score",
            params![
                user_id.to_string(),
                scope.as_str(),
                amount,
                Utc::now().to_rfc3339(),
            ],
            |row| row.get(0),
        )
        .map_err(|e| ScoreError::Store(map_write_error(e)))
    }

    /// Current score, `None` if the user has no entry in the scope.
    pub fn score(&self, user_id: Uuid, scope: Scope) -> Result<Option<i64>, ScoreError> {
        Ok(Self::score_in(self.db.connection(), user_id, scope)?)
    }

    fn score_in(conn: &Connection, user_id: Uuid, scope: Scope) -> Result<Option<i64>, DatabaseError> {
        conn.query_row(
            "SELECT score FROM score_entries WHERE user_id = ?1 AND scope = ?2",
            params![user_id.to_string(), scope.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    /// Clear every entry in `scope`. Returns the number of entries removed.
    ///
    /// Driven by an external scheduler at the weekly boundary.
    pub fn reset_scope(&self, scope: Scope) -> Result<usize, ScoreError> {
        let deleted = self
            .db
            .connection()
            .execute(
                "DELETE FROM score_entries WHERE scope = ?1",
                params![scope.as_str()],
            )
            .map_err(|e| ScoreError::Store(map_write_error(e)))?;

        tracing::info!("Reset {} {} score entries", deleted, scope);
        Ok(deleted)
    }

    /// Number of users with an entry in `scope`.
    pub fn entry_count(&self, scope: Scope) -> Result<u32, ScoreError> {
        self.db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM score_entries WHERE scope = ?1",
                params![scope.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| ScoreError::Store(DatabaseError::QueryFailed(e.to_string())))
    }
}

/// Score store errors.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("Score increment must not be negative, got {0}")]
    NegativeAmount(i64),

    #[error("Unknown leaderboard scope: {0}")]
    UnknownScope(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}
