//! Leaderboards module
//!
//! Provides ranked top-N views per scope, user standings, and export.

pub mod export;
pub mod rankings;

// Re-export commonly used types
pub use export::LeaderboardSnapshot;
pub use rankings::{
    cache_key, LeaderboardCache, LeaderboardEntry, LeaderboardError, LeaderboardService, Standing,
};
