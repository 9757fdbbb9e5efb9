//! Achievement definitions and unlock tracking.

pub mod definitions;
pub mod evaluator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::progression::{ProgressionError, XpGrant};
use crate::storage::database::{map_write_error, Database, DatabaseError};

pub use evaluator::AchievementEvaluator;

/// Tracked counter an achievement is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaType {
    /// Comments posted
    CommentsCount,
    /// Reviews published
    ReviewsCount,
    /// Accepted friendships
    FriendsCount,
    /// Rank level reached
    LevelReach,
    /// Completed shop orders
    OrdersCount,
    /// Forum threads started
    ThreadsCount,
    /// Profile fully filled in (1 = yes)
    ProfileComplete,
    /// Hardware specs fully filled in (1 = yes)
    SpecsComplete,
    /// External account linked (1 = yes)
    AccountLinked,
    /// Signup number below the threshold (early members)
    UserIdBelow,
    /// Articles read
    ArticlesRead,
}

impl CriteriaType {
    pub const ALL: [CriteriaType; 11] = [
        CriteriaType::CommentsCount,
        CriteriaType::ReviewsCount,
        CriteriaType::FriendsCount,
        CriteriaType::LevelReach,
        CriteriaType::OrdersCount,
        CriteriaType::ThreadsCount,
        CriteriaType::ProfileComplete,
        CriteriaType::SpecsComplete,
        CriteriaType::AccountLinked,
        CriteriaType::UserIdBelow,
        CriteriaType::ArticlesRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaType::CommentsCount => "comments_count",
            CriteriaType::ReviewsCount => "reviews_count",
            CriteriaType::FriendsCount => "friends_count",
            CriteriaType::LevelReach => "level_reach",
            CriteriaType::OrdersCount => "orders_count",
            CriteriaType::ThreadsCount => "threads_count",
            CriteriaType::ProfileComplete => "profile_complete",
            CriteriaType::SpecsComplete => "specs_complete",
            CriteriaType::AccountLinked => "account_linked",
            CriteriaType::UserIdBelow => "user_id_below",
            CriteriaType::ArticlesRead => "articles_read",
        }
    }

    /// Whether `value` satisfies an achievement with `threshold`.
    pub fn is_met(&self, threshold: i64, value: i64) -> bool {
        match self {
            CriteriaType::CommentsCount
            | CriteriaType::ReviewsCount
            | CriteriaType::FriendsCount
            | CriteriaType::LevelReach
            | CriteriaType::OrdersCount
            | CriteriaType::ThreadsCount
            | CriteriaType::ArticlesRead => value >= threshold,
            CriteriaType::ProfileComplete
            | CriteriaType::SpecsComplete
            | CriteriaType::AccountLinked => value >= threshold.max(1),
            CriteriaType::UserIdBelow => value > 0 && value < threshold,
        }
    }

    /// Boolean criteria take 0 or 1 as their value.
    pub fn is_flag(&self) -> bool {
        matches!(
            self,
            CriteriaType::ProfileComplete | CriteriaType::SpecsComplete | CriteriaType::AccountLinked
        )
    }
}

impl fmt::Display for CriteriaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CriteriaType {
    type Err = AchievementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CriteriaType::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AchievementError::UnknownCriteria(s.to_string()))
    }
}

/// Achievement definition. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    /// Stable key
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub criteria_type: CriteriaType,
    pub criteria_value: i64,
    #[serde(default)]
    pub xp_reward: i64,
}

impl Achievement {
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        criteria_type: CriteriaType,
        criteria_value: i64,
        xp_reward: i64,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            criteria_type,
            criteria_value,
            xp_reward,
        }
    }

    fn validate(&self) -> Result<(), AchievementError> {
        let invalid = |reason: &str| AchievementError::InvalidDefinition {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("empty name"));
        }
        if self.criteria_value < 0 {
            return Err(invalid("negative criteria value"));
        }
        if self.xp_reward < 0 {
            return Err(invalid("negative XP reward"));
        }
        if self.criteria_type.is_flag() && self.criteria_value > 1 {
            return Err(invalid("flag criteria value must be 0 or 1"));
        }
        if self.criteria_type == CriteriaType::UserIdBelow && self.criteria_value < 2 {
            return Err(invalid("user_id_below threshold can never be met"));
        }
        Ok(())
    }
}

/// A user's unlock of an achievement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAchievement {
    pub user_id: Uuid,
    pub achievement_id: String,
    pub unlocked_at: DateTime<Utc>,
}

/// An achievement with the user's state for it.
#[derive(Debug, Clone)]
pub struct AchievementStatus {
    pub achievement: Achievement,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl AchievementStatus {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// Achievement unlocked event.
#[derive(Debug, Clone)]
pub struct AchievementUnlocked {
    /// Achievement that was unlocked
    pub achievement: Achievement,
    /// User who unlocked it
    pub user_id: Uuid,
    /// When unlocked
    pub unlocked_at: DateTime<Utc>,
    /// XP granted for the reward, including any rank change it caused
    pub xp_grant: XpGrant,
}

/// Validated set of achievement definitions.
#[derive(Debug, Clone, Default)]
pub struct AchievementCatalog {
    achievements: Vec<Achievement>,
}

impl AchievementCatalog {
    /// Validate definitions. Keys must be unique.
    pub fn new(achievements: Vec<Achievement>) -> Result<Self, AchievementError> {
        let mut seen = HashSet::new();
        for achievement in &achievements {
            achievement.validate()?;
            if !seen.insert(achievement.id.as_str()) {
                return Err(AchievementError::DuplicateId(achievement.id.clone()));
            }
        }
        Ok(Self { achievements })
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn get(&self, id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    /// Definitions for one criteria type.
    pub fn by_criteria(&self, criteria: CriteriaType) -> Vec<&Achievement> {
        self.achievements
            .iter()
            .filter(|a| a.criteria_type == criteria)
            .collect()
    }

    /// Store any definitions not yet present. Existing rows are left untouched.
    pub fn seed(&self, db: &Database) -> Result<usize, AchievementError> {
        let tx = db.immediate_transaction()?;
        let mut inserted = 0;

        for achievement in &self.achievements {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO achievements
                     (id, name, description, criteria_type, criteria_value, xp_reward)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        achievement.id,
                        achievement.name,
                        achievement.description,
                        achievement.criteria_type.as_str(),
                        achievement.criteria_value,
                        achievement.xp_reward,
                    ],
                )
                .map_err(map_write_error)?;
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        if inserted > 0 {
            tracing::info!("Seeded {} achievement definitions", inserted);
        }
        Ok(inserted)
    }

    pub fn len(&self) -> usize {
        self.achievements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty()
    }
}

/// Achievement errors.
#[derive(Debug, thiserror::Error)]
pub enum AchievementError {
    #[error("Unknown criteria type: {0}")]
    UnknownCriteria(String),

    #[error("Criteria value must not be negative, got {0}")]
    NegativeValue(i64),

    #[error("Invalid achievement {id}: {reason}")]
    InvalidDefinition { id: String, reason: String },

    #[error("Duplicate achievement id: {0}")]
    DuplicateId(String),

    #[error("User not found: {0}")]
    UnknownUser(Uuid),

    #[error(transparent)]
    Progression(#[from] ProgressionError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}
