//! Shared fixtures for integration tests

use gamecore::achievements::{Achievement, CriteriaType};
use gamecore::ranks::Rank;
use gamecore::storage::{Database, GamificationConfig};
use gamecore::{GamificationContext, GamificationEngine};
use std::path::Path;

/// Three tiers and a single friends achievement, so XP totals are exact.
pub fn small_config() -> GamificationConfig {
    GamificationConfig {
        ranks: vec![
            Rank::new(1, "Novice", 0),
            Rank::new(2, "Apprentice", 100),
            Rank::new(3, "Explorer", 250),
        ],
        achievements: vec![Achievement::new(
            "social_butterfly",
            "Social Butterfly",
            "Have 5 friends",
            CriteriaType::FriendsCount,
            5,
            150,
        )],
        ..Default::default()
    }
}

/// Config whose database lives under `dir`.
pub fn file_config(dir: &Path) -> GamificationConfig {
    let mut config = small_config();
    config.storage.database_path = Some(dir.join("game.db"));
    config
}

/// Engine on a fresh in-memory store.
pub fn memory_engine(ctx: &GamificationContext) -> GamificationEngine {
    let db = Database::open_in_memory().unwrap();
    ctx.prepare_store(&db).unwrap();
    ctx.engine(db)
}
