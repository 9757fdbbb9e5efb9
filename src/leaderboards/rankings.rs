//! Leaderboard rankings service.
//!
//! Top-N reads go through the shared read-through cache and are eventually
//! consistent within the configured TTL. Single-user position lookups always
//! hit the store.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{CacheError, ReadThroughCache};
use crate::ranks::{Rank, RankTable};
use crate::scores::Scope;
use crate::storage::{Database, DatabaseError, LeaderboardSettings};

/// Leaderboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub position: u32,
    pub user_id: Uuid,
    pub display_name: String,
    pub score: i64,
    /// Rank resolved from the user's cumulative XP
    pub rank: Rank,
}

/// A user's standing within a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub position: u32,
    pub total_users: u32,
    pub score: i64,
    pub percentile: f64,
}

/// Shared cache of the top entries per scope.
pub type LeaderboardCache = ReadThroughCache<Arc<Vec<LeaderboardEntry>>>;

/// Cache key for a scope's leaderboard.
pub fn cache_key(scope: Scope) -> String {
    format!("leaderboard:{}", scope)
}

/// Leaderboard service.
pub struct LeaderboardService {
    db: Arc<Database>,
    ranks: Arc<RankTable>,
    cache: Arc<LeaderboardCache>,
    settings: LeaderboardSettings,
}

impl LeaderboardService {
    /// Create a new leaderboard service.
    pub fn new(
        db: Arc<Database>,
        ranks: Arc<RankTable>,
        cache: Arc<LeaderboardCache>,
        settings: LeaderboardSettings,
    ) -> Self {
        Self {
            db,
            ranks,
            cache,
            settings,
        }
    }

    /// Top `limit` users by score, highest first.
    ///
    /// Pages up to `cached_entries` are served from the cache; larger ones
    /// query the store directly.
    pub fn get_top(
        &self,
        limit: usize,
        scope: Scope,
    ) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if limit > self.settings.cached_entries {
            return self.query_top(limit, scope);
        }

        let key = cache_key(scope);
        let cached = self.cache.get_or_compute(&key, self.settings.cache_ttl(), || {
            self.query_top(self.settings.cached_entries, scope)
                .map(Arc::new)
        });

        match cached {
            Ok(cached) => Ok(cached.value.iter().take(limit).cloned().collect()),
            Err(CacheError::Compute(e)) => Err(e),
            Err(CacheError::WaitTimeout(key)) => {
                tracing::warn!("Timed out waiting for cached {}, reading store", key);
                self.query_top(limit, scope)
            }
        }
    }

    /// Top entries using the configured default page size.
    pub fn get_default_page(&self, scope: Scope) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        self.get_top(self.settings.default_limit, scope)
    }

    /// 1-based position of a user, `None` if unranked in this scope.
    pub fn get_user_rank(
        &self,
        user_id: Uuid,
        scope: Scope,
    ) -> Result<Option<u32>, LeaderboardError> {
        Ok(self.user_position(user_id, scope)?.map(|(position, _)| position))
    }

    /// Position, score and percentile of a user within a scope.
    pub fn standing(
        &self,
        user_id: Uuid,
        scope: Scope,
    ) -> Result<Option<Standing>, LeaderboardError> {
        let (position, score) = match self.user_position(user_id, scope)? {
            Some(found) => found,
            None => return Ok(None),
        };

        let total_users = self.total_users(scope)?;
        let percentile = if total_users > 0 {
            100.0 * (1.0 - (position as f64 / total_users as f64))
        } else {
            0.0
        };

        Ok(Some(Standing {
            position,
            total_users,
            score,
            percentile,
        }))
    }

    /// Drop the cached leaderboard for `scope`.
    pub fn invalidate(&self, scope: Scope) -> bool {
        self.cache.invalidate(&cache_key(scope))
    }

    fn user_position(
        &self,
        user_id: Uuid,
        scope: Scope,
    ) -> Result<Option<(u32, i64)>, LeaderboardError> {
        use rusqlite::OptionalExtension;

        let conn = self.db.connection();
        let entry: Option<(i64, i64)> = conn
            .query_row(
                "SELECT score, reached_seq FROM score_entries WHERE user_id = ?1 AND scope = ?2",
                rusqlite::params![user_id.to_string(), scope.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| LeaderboardError::Store(DatabaseError::QueryFailed(e.to_string())))?;

        let (score, reached_seq) = match entry {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let ahead: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM score_entries
                 WHERE scope = ?1
                   AND (score > ?2 OR (score = ?2 AND reached_seq < ?3))",
                rusqlite::params![scope.as_str(), score, reached_seq],
                |row| row.get(0),
            )
            .map_err(|e| LeaderboardError::Store(DatabaseError::QueryFailed(e.to_string())))?;

        Ok(Some((ahead + 1, score)))
    }

    fn total_users(&self, scope: Scope) -> Result<u32, LeaderboardError> {
        self.db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM score_entries WHERE scope = ?1",
                rusqlite::params![scope.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| LeaderboardError::Store(DatabaseError::QueryFailed(e.to_string())))
    }

    fn query_top(
        &self,
        limit: usize,
        scope: Scope,
    ) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare(
                "SELECT s.user_id, u.display_name, s.score, u.xp
                 FROM score_entries s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.scope = ?1
                 ORDER BY s.score DESC, s.reached_seq ASC
                 LIMIT ?2",
            )
            .map_err(|e| LeaderboardError::Store(DatabaseError::QueryFailed(e.to_string())))?;

        let rows = stmt
            .query_map(rusqlite::params![scope.as_str(), limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| LeaderboardError::Store(DatabaseError::QueryFailed(e.to_string())))?;

        let mut entries = Vec::new();
        let mut position = 0u32;

        for row in rows {
            position += 1;
            let (user_id_str, display_name, score, xp) = row
                .map_err(|e| LeaderboardError::Store(DatabaseError::QueryFailed(e.to_string())))?;

            let user_id = Uuid::parse_str(&user_id_str).map_err(|e| {
                LeaderboardError::Store(DatabaseError::DeserializationError(e.to_string()))
            })?;

            entries.push(LeaderboardEntry {
                position,
                user_id,
                display_name,
                score,
                rank: self.ranks.resolve(xp).clone(),
            });
        }

        Ok(entries)
    }
}

/// Leaderboard errors.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error(transparent)]
    Store(#[from] DatabaseError),
}
