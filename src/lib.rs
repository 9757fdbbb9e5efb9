//! GameCore - Gamification Engine
//!
//! XP, ranks, achievements and leaderboards for community platforms.
//! Scores and unlocks are persisted in SQLite and stay correct when several
//! workers write to the same database concurrently; leaderboard reads go
//! through a shared single-flight cache.

pub mod achievements;
pub mod cache;
pub mod leaderboards;
pub mod logging;
pub mod progression;
pub mod ranks;
pub mod scores;
pub mod storage;

// Re-export commonly used types
pub use achievements::{Achievement, AchievementEvaluator, AchievementUnlocked, CriteriaType};
pub use cache::ReadThroughCache;
pub use leaderboards::{LeaderboardEntry, LeaderboardService};
pub use progression::{GamificationContext, GamificationEngine, GamificationError, XpOutcome};
pub use ranks::{Rank, RankTable};
pub use scores::{Scope, ScoreStore};
pub use storage::{Database, GamificationConfig};
