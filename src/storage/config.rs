//! Engine configuration.
//!
//! Loaded from TOML in the platform data directory. Every section has
//! defaults, so a missing file or a partial file both work.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::achievements::{definitions, Achievement, AchievementCatalog, AchievementError};
use crate::ranks::{default_ranks, Rank, RankError, RankTable};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GamificationConfig {
    /// Configuration format version
    pub version: String,
    /// Database settings
    pub storage: StorageSettings,
    /// Leaderboard and cache settings
    pub leaderboard: LeaderboardSettings,
    /// Rank tiers
    pub ranks: Vec<Rank>,
    /// Achievement definitions
    pub achievements: Vec<Achievement>,
}

impl Default for GamificationConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage: StorageSettings::default(),
            leaderboard: LeaderboardSettings::default(),
            ranks: default_ranks(),
            achievements: definitions::all_achievements(),
        }
    }
}

impl GamificationConfig {
    /// Build the validated rank table.
    pub fn rank_table(&self) -> Result<RankTable, ConfigError> {
        RankTable::new(self.ranks.clone()).map_err(ConfigError::Ranks)
    }

    /// Build the validated achievement catalog.
    pub fn achievement_catalog(&self) -> Result<AchievementCatalog, ConfigError> {
        AchievementCatalog::new(self.achievements.clone()).map_err(ConfigError::Achievements)
    }

    /// Check settings that would make the engine misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rank_table()?;
        self.achievement_catalog()?;

        if self.leaderboard.cached_entries == 0 {
            return Err(ConfigError::Invalid(
                "leaderboard.cached_entries must be at least 1".to_string(),
            ));
        }
        if self.leaderboard.default_limit == 0 {
            return Err(ConfigError::Invalid(
                "leaderboard.default_limit must be at least 1".to_string(),
            ));
        }
        if self.storage.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage.busy_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file; defaults to `gamecore.db` in the data directory
    pub database_path: Option<PathBuf>,
    /// How long a statement waits on another connection's lock
    pub busy_timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: 5_000,
        }
    }
}

impl StorageSettings {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| get_data_dir().join("gamecore.db"))
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Leaderboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardSettings {
    /// How long a cached leaderboard is served before recomputation
    pub cache_ttl_secs: u64,
    /// Entries cached per scope; larger pages bypass the cache
    pub cached_entries: usize,
    /// Page size when the caller does not ask for one
    pub default_limit: usize,
    /// How long a reader waits for another reader's computation
    pub cache_wait_timeout_ms: u64,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            cached_entries: 100,
            default_limit: 10,
            cache_wait_timeout_ms: 2_000,
        }
    }
}

impl LeaderboardSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_wait_timeout_ms)
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "gamecore", "GameCore")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load configuration from the default location.
pub fn load_config() -> Result<GamificationConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load and validate configuration from `path`, falling back to defaults
/// if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<GamificationConfig, ConfigError> {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(GamificationConfig::default());
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let config: GamificationConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.validate()?;
    Ok(config)
}

/// Save configuration to `path`.
pub fn save_config(config: &GamificationConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid rank table: {0}")]
    Ranks(RankError),

    #[error("Invalid achievement catalog: {0}")]
    Achievements(AchievementError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
