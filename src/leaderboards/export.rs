//! Leaderboard snapshot export.
//!
//! Provides JSON and CSV export of a scope's current top entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rankings::{LeaderboardEntry, LeaderboardError, LeaderboardService};
use crate::scores::Scope;

/// Export format for leaderboard data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub scope: Scope,
    pub entries: Vec<LeaderboardEntry>,
    pub exported_at: DateTime<Utc>,
    pub export_version: String,
}

impl LeaderboardSnapshot {
    /// Capture the top `limit` entries of `scope`.
    pub fn capture(
        service: &LeaderboardService,
        limit: usize,
        scope: Scope,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            scope,
            entries: service.get_top(limit, scope)?,
            exported_at: Utc::now(),
            export_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Export to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ExportError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ExportError::SerializationFailed(e.to_string()))
    }

    /// Parse a snapshot previously written by [`LeaderboardSnapshot::to_json`].
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        serde_json::from_str(json).map_err(|e| ExportError::InvalidFormat(e.to_string()))
    }

    /// Export to CSV with a header row.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("position,user_id,display_name,score,rank_level,rank_name\n");

        for entry in &self.entries {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                entry.position,
                entry.user_id,
                escape_csv(&entry.display_name),
                entry.score,
                entry.rank.level,
                escape_csv(&entry.rank.name),
            ));
        }

        csv
    }
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}
