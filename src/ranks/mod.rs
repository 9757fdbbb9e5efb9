//! Rank tiers and XP-to-rank resolution.
//!
//! A [`RankTable`] is validated once when it is loaded and is immutable
//! afterwards, so resolution is a pure lookup with no failure path.

use serde::{Deserialize, Serialize};

/// A named tier unlocked at a cumulative XP threshold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rank {
    /// Tier number, 1 for the entry tier
    pub level: u32,
    /// Display name
    pub name: String,
    /// Minimum cumulative XP to hold this tier
    pub min_xp: i64,
}

impl Rank {
    /// Create a rank tier.
    pub fn new(level: u32, name: &str, min_xp: i64) -> Self {
        Self {
            level,
            name: name.to_string(),
            min_xp,
        }
    }
}

/// Where a user stands within the rank table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankProgress {
    pub current: Rank,
    pub next: Option<Rank>,
    /// XP earned since reaching the current tier
    pub xp_into_tier: i64,
    /// XP still needed for the next tier, `None` at the top tier
    pub xp_to_next: Option<i64>,
}

impl RankProgress {
    /// Progress through the current tier (0..100). Always 100 at the top tier.
    pub fn percentage(&self) -> f32 {
        match (&self.next, self.xp_to_next) {
            (Some(next), Some(_)) => {
                let span = next.min_xp - self.current.min_xp;
                if span <= 0 {
                    return 100.0;
                }
                ((self.xp_into_tier as f64 / span as f64) * 100.0).min(100.0) as f32
            }
            _ => 100.0,
        }
    }
}

/// Ordered, validated rank tiers.
#[derive(Debug, Clone)]
pub struct RankTable {
    /// Sorted ascending by `min_xp`
    tiers: Vec<Rank>,
}

impl RankTable {
    /// Build a table from tiers in any order.
    ///
    /// Fails if the table is empty, thresholds or levels repeat, the lowest
    /// tier is not level 1 at 0 XP, or levels do not rise with thresholds.
    pub fn new(mut tiers: Vec<Rank>) -> Result<Self, RankError> {
        if tiers.is_empty() {
            return Err(RankError::Empty);
        }

        tiers.sort_by_key(|r| r.min_xp);

        for pair in tiers.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if lower.min_xp == upper.min_xp {
                return Err(RankError::DuplicateThreshold {
                    min_xp: upper.min_xp,
                    first: lower.name.clone(),
                    second: upper.name.clone(),
                });
            }
            if lower.level >= upper.level {
                return Err(RankError::LevelOrder {
                    level: upper.level,
                    name: upper.name.clone(),
                });
            }
        }

        let base = &tiers[0];
        if base.level != 1 || base.min_xp != 0 {
            return Err(RankError::InvalidBaseTier {
                level: base.level,
                min_xp: base.min_xp,
            });
        }

        if let Some(blank) = tiers.iter().find(|r| r.name.trim().is_empty()) {
            return Err(RankError::MissingName(blank.level));
        }

        Ok(Self { tiers })
    }

    /// The tier with the greatest threshold not above `xp`.
    ///
    /// Negative XP (never produced by the ledger) resolves to the base tier.
    pub fn resolve(&self, xp: i64) -> &Rank {
        let idx = self.tiers.partition_point(|r| r.min_xp <= xp);
        &self.tiers[idx.saturating_sub(1)]
    }

    /// The tier after the one `xp` resolves to, if any.
    pub fn next_rank(&self, xp: i64) -> Option<&Rank> {
        let idx = self.tiers.partition_point(|r| r.min_xp <= xp);
        self.tiers.get(idx.max(1))
    }

    /// Current tier, next tier and XP distances for display.
    pub fn progress(&self, xp: i64) -> RankProgress {
        let current = self.resolve(xp).clone();
        let next = self.next_rank(xp).cloned();
        let xp_to_next = next.as_ref().map(|n| n.min_xp - xp);

        RankProgress {
            xp_into_tier: xp - current.min_xp,
            current,
            next,
            xp_to_next,
        }
    }

    /// Look up a tier by level.
    pub fn by_level(&self, level: u32) -> Option<&Rank> {
        self.tiers.iter().find(|r| r.level == level)
    }

    /// The highest tier.
    pub fn top(&self) -> &Rank {
        &self.tiers[self.tiers.len() - 1]
    }

    /// All tiers, lowest first.
    pub fn tiers(&self) -> &[Rank] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Default rank table shipped with the engine.
pub fn default_ranks() -> Vec<Rank> {
    vec![
        Rank::new(1, "Novice", 0),
        Rank::new(2, "Apprentice", 100),
        Rank::new(3, "Explorer", 250),
        Rank::new(4, "Adventurer", 500),
        Rank::new(5, "Veteran", 1000),
        Rank::new(6, "Legend", 2500),
    ]
}

/// Rank table configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankError {
    #[error("Rank table is empty")]
    Empty,

    #[error("Duplicate rank threshold {min_xp} XP ({first} and {second})")]
    DuplicateThreshold {
        min_xp: i64,
        first: String,
        second: String,
    },

    #[error("Rank level {level} ({name}) is out of order")]
    LevelOrder { level: u32, name: String },

    #[error("Lowest rank must be level 1 at 0 XP, found level {level} at {min_xp} XP")]
    InvalidBaseTier { level: u32, min_xp: i64 },

    #[error("Rank level {0} has no name")]
    MissingName(u32),
}
