//! Database schema definitions for the gamification store.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Users table
CREATE TABLE IF NOT EXISTS users (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    xp INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
    rank_level INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

-- Rank tiers
CREATE TABLE IF NOT EXISTS ranks (
    level INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    min_xp INTEGER NOT NULL UNIQUE
);

-- Achievement definitions
CREATE TABLE IF NOT EXISTS achievements (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    criteria_type TEXT NOT NULL,
    criteria_value INTEGER NOT NULL,
    xp_reward INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_achievements_criteria ON achievements(criteria_type);

-- Unlocked achievements
CREATE TABLE IF NOT EXISTS user_achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    achievement_id TEXT NOT NULL REFERENCES achievements(id),
    unlocked_at TEXT NOT NULL,
    UNIQUE(user_id, achievement_id)
);

CREATE INDEX IF NOT EXISTS idx_user_achievements_user ON user_achievements(user_id);
"#;

/// SQL for schema version tracking (migrations)
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for migration from v1 to v2 (scoped leaderboard scores)
pub const MIGRATION_V1_TO_V2: &str = r#"
CREATE TABLE IF NOT EXISTS score_entries (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    scope TEXT NOT NULL,
    score INTEGER NOT NULL DEFAULT 0 CHECK (score >= 0),
    reached_seq INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, scope)
);

CREATE INDEX IF NOT EXISTS idx_score_entries_ranking
    ON score_entries(scope, score DESC, reached_seq ASC);
"#;
