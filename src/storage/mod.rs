//! Storage module for database and configuration.

pub mod config;
pub mod database;
pub mod schema;

pub use config::{GamificationConfig, LeaderboardSettings, StorageSettings};
pub use database::{Database, DatabaseError, User};
