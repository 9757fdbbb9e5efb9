//! XP progression: the single "add XP" operation and the engine around it.

pub mod engine;

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use uuid::Uuid;

use crate::ranks::{Rank, RankTable};
use crate::scores::{Scope, ScoreError, ScoreStore};
use crate::storage::database::{map_write_error, DatabaseError};

pub use engine::{GamificationContext, GamificationEngine, GamificationError, XpOutcome};

/// Result of applying an XP grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpGrant {
    pub user_id: Uuid,
    pub amount: i64,
    /// Cumulative XP after the grant
    pub total_xp: i64,
    pub previous_rank: Rank,
    pub rank: Rank,
}

impl XpGrant {
    pub fn rank_changed(&self) -> bool {
        self.previous_rank.level != self.rank.level
    }
}

/// Applies XP grants: user XP, every score scope, and the rank write-back.
#[derive(Debug, Clone)]
pub struct XpLedger {
    ranks: Arc<RankTable>,
}

impl XpLedger {
    pub fn new(ranks: Arc<RankTable>) -> Self {
        Self { ranks }
    }

    pub fn ranks(&self) -> &RankTable {
        &self.ranks
    }

    /// Add `amount` XP to a user.
    ///
    /// Each statement is atomic on its own; callers that need the XP,
    /// score and rank updates to land together run this inside a
    /// transaction on `conn`.
    pub fn apply(
        &self,
        conn: &Connection,
        user_id: Uuid,
        amount: i64,
    ) -> Result<XpGrant, ProgressionError> {
        if amount < 0 {
            return Err(ProgressionError::NegativeXp(amount));
        }

        let total_xp: i64 = conn
            .query_row(
                "UPDATE users SET xp = xp + ?1 WHERE id = ?2 RETURNING xp",
                params![amount, user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_write_error)?
            .ok_or(ProgressionError::UnknownUser(user_id))?;

        for scope in Scope::ALL {
            ScoreStore::increment_in(conn, user_id, amount, scope)?;
        }

        let previous_rank = self.ranks.resolve(total_xp - amount).clone();
        let rank = self.ranks.resolve(total_xp).clone();

        // Rank only moves up; a concurrent grant that already wrote a higher
        // level must not be overwritten by this one.
        conn.execute(
            "UPDATE users SET rank_level = ?1 WHERE id = ?2 AND rank_level < ?1",
            params![rank.level, user_id.to_string()],
        )
        .map_err(map_write_error)?;

        if previous_rank.level != rank.level {
            tracing::info!(
                "User {} ranked up from {} to {} ({} XP)",
                user_id,
                previous_rank.name,
                rank.name,
                total_xp
            );
        }

        Ok(XpGrant {
            user_id,
            amount,
            total_xp,
            previous_rank,
            rank,
        })
    }
}

/// Progression errors.
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    #[error("XP amount must not be negative, got {0}")]
    NegativeXp(i64),

    #[error("User not found: {0}")]
    UnknownUser(Uuid),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}
