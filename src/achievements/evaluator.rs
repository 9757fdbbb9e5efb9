//! Achievement criteria checking and unlocking.
//!
//! Unlocks are `INSERT OR IGNORE` against `UNIQUE(user_id, achievement_id)`,
//! so when two workers race for the same achievement exactly one insert
//! lands and only that worker grants the reward. The insert and the reward
//! share one immediate transaction.

use chrono::Utc;
use rusqlite::params;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    Achievement, AchievementError, AchievementStatus, AchievementUnlocked, CriteriaType,
    UserAchievement,
};
use crate::progression::XpLedger;
use crate::storage::database::{map_write_error, parse_timestamp, Database, DatabaseError};

/// Evaluates counters against achievement thresholds.
pub struct AchievementEvaluator {
    db: Arc<Database>,
    ledger: XpLedger,
}

impl AchievementEvaluator {
    /// Create a new evaluator. Reward XP is granted through `ledger`.
    pub fn new(db: Arc<Database>, ledger: XpLedger) -> Self {
        Self { db, ledger }
    }

    /// Unlock every locked achievement of `criteria` that `current_value`
    /// satisfies, granting each reward once.
    ///
    /// Each unlock commits on its own. If one fails after others succeeded,
    /// the committed unlocks are returned and the failure is logged.
    ///
    /// Reward XP updates scores and rank but never re-enters evaluation,
    /// even when it lifts the user into a new `level_reach` tier.
    pub fn check_and_unlock(
        &self,
        user_id: Uuid,
        criteria: CriteriaType,
        current_value: i64,
    ) -> Result<Vec<AchievementUnlocked>, AchievementError> {
        if current_value < 0 {
            return Err(AchievementError::NegativeValue(current_value));
        }

        if self.db.get_user(&user_id)?.is_none() {
            return Err(AchievementError::UnknownUser(user_id));
        }

        let candidates: Vec<Achievement> = self
            .locked_achievements(user_id, criteria)?
            .into_iter()
            .filter(|a| criteria.is_met(a.criteria_value, current_value))
            .collect();

        let mut unlocked = Vec::new();
        for achievement in candidates {
            let id = achievement.id.clone();
            match self.unlock(user_id, achievement) {
                Ok(Some(event)) => unlocked.push(event),
                Ok(None) => {}
                // Earlier unlocks are committed; report them and leave the
                // rest locked for the next trigger.
                Err(e) if !unlocked.is_empty() => {
                    tracing::warn!(
                        "Stopped unlocking for user {} at {} after {} unlock(s): {}",
                        user_id,
                        id,
                        unlocked.len(),
                        e
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(unlocked)
    }

    /// Same as [`AchievementEvaluator::check_and_unlock`] for a criteria
    /// name coming from an untyped caller.
    pub fn check_and_unlock_named(
        &self,
        user_id: Uuid,
        criteria: &str,
        current_value: i64,
    ) -> Result<Vec<AchievementUnlocked>, AchievementError> {
        let criteria: CriteriaType = criteria.parse()?;
        self.check_and_unlock(user_id, criteria, current_value)
    }

    /// Insert-if-absent the unlock row and, if this call won, grant the reward.
    fn unlock(
        &self,
        user_id: Uuid,
        achievement: Achievement,
    ) -> Result<Option<AchievementUnlocked>, AchievementError> {
        let tx = self.db.immediate_transaction()?;
        let unlocked_at = Utc::now();

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    user_id.to_string(),
                    achievement.id,
                    unlocked_at.to_rfc3339()
                ],
            )
            .map_err(map_write_error)?;

        if inserted == 0 {
            tracing::debug!(
                "Achievement {} already unlocked for user {}",
                achievement.id,
                user_id
            );
            return Ok(None);
        }

        let xp_grant = self.ledger.apply(&tx, user_id, achievement.xp_reward)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tracing::info!(
            "User {} unlocked achievement {} (+{} XP)",
            user_id,
            achievement.id,
            achievement.xp_reward
        );

        Ok(Some(AchievementUnlocked {
            achievement,
            user_id,
            unlocked_at,
            xp_grant,
        }))
    }

    /// Achievements of `criteria` the user has not unlocked yet.
    fn locked_achievements(
        &self,
        user_id: Uuid,
        criteria: CriteriaType,
    ) -> Result<Vec<Achievement>, AchievementError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare(
                "SELECT a.id, a.name, a.description, a.criteria_type, a.criteria_value, a.xp_reward
                 FROM achievements a
                 WHERE a.criteria_type = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM user_achievements ua
                       WHERE ua.user_id = ?2 AND ua.achievement_id = a.id
                   )
                 ORDER BY a.criteria_value ASC, a.id ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![criteria.as_str(), user_id.to_string()], read_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut achievements = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            achievements.push(row.into_achievement()?);
        }

        Ok(achievements)
    }

    /// Every stored achievement with the user's unlock time, if any.
    pub fn list_user_achievements(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AchievementStatus>, AchievementError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare(
                "SELECT a.id, a.name, a.description, a.criteria_type, a.criteria_value, a.xp_reward,
                        ua.unlocked_at
                 FROM achievements a
                 LEFT JOIN user_achievements ua
                   ON ua.achievement_id = a.id AND ua.user_id = ?1
                 ORDER BY a.criteria_type ASC, a.criteria_value ASC, a.id ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id.to_string()], |row| {
                Ok((read_row(row)?, row.get::<_, Option<String>>(6)?))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut statuses = Vec::new();
        for row in rows {
            let (row, unlocked_str) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            statuses.push(AchievementStatus {
                achievement: row.into_achievement()?,
                unlocked_at: unlocked_str.as_deref().map(parse_timestamp).transpose()?,
            });
        }

        Ok(statuses)
    }

    /// The user's unlocks, most recent first.
    pub fn unlocked_achievements(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserAchievement>, AchievementError> {
        let conn = self.db.connection();
        let mut stmt = conn
            .prepare(
                "SELECT achievement_id, unlocked_at FROM user_achievements
                 WHERE user_id = ?1
                 ORDER BY unlocked_at DESC, id DESC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut unlocked = Vec::new();
        for row in rows {
            let (achievement_id, unlocked_str) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            unlocked.push(UserAchievement {
                user_id,
                achievement_id,
                unlocked_at: parse_timestamp(&unlocked_str)?,
            });
        }

        Ok(unlocked)
    }
}

/// Intermediate row struct for achievement queries.
struct AchievementRow {
    id: String,
    name: String,
    description: String,
    criteria_type: String,
    criteria_value: i64,
    xp_reward: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AchievementRow> {
    Ok(AchievementRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        criteria_type: row.get(3)?,
        criteria_value: row.get(4)?,
        xp_reward: row.get(5)?,
    })
}

impl AchievementRow {
    /// Unknown criteria in stored rows is a configuration error, not a default.
    fn into_achievement(self) -> Result<Achievement, AchievementError> {
        Ok(Achievement {
            criteria_type: self.criteria_type.parse()?,
            id: self.id,
            name: self.name,
            description: self.description,
            criteria_value: self.criteria_value,
            xp_reward: self.xp_reward,
        })
    }
}
