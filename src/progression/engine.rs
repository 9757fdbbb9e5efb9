//! Gamification engine.
//!
//! [`GamificationContext`] is built once per process from validated
//! configuration and owns everything workers share: the rank table, the
//! achievement catalog and the leaderboard cache. Each worker gets its own
//! [`GamificationEngine`] bound to its own database connection.
//!
//! Flow for an XP-granting event: user XP and scores are incremented and the
//! rank re-resolved in one transaction, then a single `level_reach`
//! achievement pass runs if the rank changed. Reward XP from that pass does
//! not trigger another pass.

use std::sync::Arc;
use uuid::Uuid;

use super::{ProgressionError, XpGrant, XpLedger};
use crate::achievements::{
    AchievementCatalog, AchievementError, AchievementEvaluator, AchievementStatus,
    AchievementUnlocked, CriteriaType,
};
use crate::leaderboards::{
    LeaderboardCache, LeaderboardEntry, LeaderboardError, LeaderboardService, Standing,
};
use crate::ranks::{Rank, RankProgress, RankTable};
use crate::scores::{Scope, ScoreError, ScoreStore};
use crate::storage::config::ConfigError;
use crate::storage::{Database, DatabaseError, GamificationConfig, User};

/// Process-wide engine state, created at startup.
pub struct GamificationContext {
    config: GamificationConfig,
    ranks: Arc<RankTable>,
    catalog: Arc<AchievementCatalog>,
    cache: Arc<LeaderboardCache>,
}

impl GamificationContext {
    /// Validate configuration and build shared state. Fails fast on a bad
    /// rank table or achievement catalog.
    pub fn new(config: GamificationConfig) -> Result<Self, GamificationError> {
        config.validate()?;

        let ranks = Arc::new(config.rank_table()?);
        let catalog = Arc::new(config.achievement_catalog()?);
        let cache = Arc::new(LeaderboardCache::new(
            config.leaderboard.cache_wait_timeout(),
        ));

        tracing::info!(
            "Gamification ready: {} ranks, {} achievements",
            ranks.len(),
            catalog.len()
        );

        Ok(Self {
            config,
            ranks,
            catalog,
            cache,
        })
    }

    /// Write the rank table and any new achievement definitions to the store.
    pub fn prepare_store(&self, db: &Database) -> Result<(), GamificationError> {
        db.replace_ranks(self.ranks.tiers())?;
        self.catalog.seed(db)?;
        Ok(())
    }

    /// Open the configured database file, prepare it, and return an engine
    /// on that connection.
    pub fn open_prepared(&self) -> Result<GamificationEngine, GamificationError> {
        let engine = self.open_engine()?;
        self.prepare_store(&engine.db)?;
        Ok(engine)
    }

    /// Open a new connection to the configured database for one worker.
    pub fn open_engine(&self) -> Result<GamificationEngine, GamificationError> {
        let storage = &self.config.storage;
        let db = Database::open(&storage.database_path(), storage.busy_timeout())?;
        Ok(self.engine(db))
    }

    /// Build an engine on an existing connection.
    pub fn engine(&self, db: Database) -> GamificationEngine {
        let db = Arc::new(db);
        let ledger = XpLedger::new(Arc::clone(&self.ranks));

        GamificationEngine {
            scores: ScoreStore::new(Arc::clone(&db)),
            evaluator: AchievementEvaluator::new(Arc::clone(&db), ledger.clone()),
            leaderboards: LeaderboardService::new(
                Arc::clone(&db),
                Arc::clone(&self.ranks),
                Arc::clone(&self.cache),
                self.config.leaderboard.clone(),
            ),
            ledger,
            db,
        }
    }

    pub fn config(&self) -> &GamificationConfig {
        &self.config
    }

    pub fn ranks(&self) -> &RankTable {
        &self.ranks
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<LeaderboardCache> {
        &self.cache
    }
}

/// Result of granting XP.
#[derive(Debug, Clone)]
pub struct XpOutcome {
    /// The grant itself
    pub grant: XpGrant,
    /// Level achievements unlocked because the rank changed
    pub unlocked: Vec<AchievementUnlocked>,
}

impl XpOutcome {
    /// Cumulative XP after the grant and any achievement rewards.
    pub fn total_xp(&self) -> i64 {
        self.unlocked
            .last()
            .map(|u| u.xp_grant.total_xp)
            .unwrap_or(self.grant.total_xp)
    }

    /// Rank after the grant and any achievement rewards.
    pub fn rank(&self) -> &Rank {
        self.unlocked
            .last()
            .map(|u| &u.xp_grant.rank)
            .unwrap_or(&self.grant.rank)
    }
}

/// A user with their rank progress.
#[derive(Debug, Clone)]
pub struct UserProgress {
    pub user: User,
    pub progress: RankProgress,
}

/// Per-worker engine bound to one database connection.
pub struct GamificationEngine {
    db: Arc<Database>,
    ledger: XpLedger,
    scores: ScoreStore,
    evaluator: AchievementEvaluator,
    leaderboards: LeaderboardService,
}

impl GamificationEngine {
    /// Create a user and evaluate signup-order achievements.
    ///
    /// Once the user row is committed the call succeeds; a failed
    /// achievement pass is logged and yields no unlocks.
    pub fn register_user(
        &self,
        user_id: Uuid,
        display_name: &str,
    ) -> Result<(User, Vec<AchievementUnlocked>), GamificationError> {
        let mut user = self.db.create_user(user_id, display_name)?;

        let unlocked = match self.evaluate_signup(user_id) {
            Ok(unlocked) => unlocked,
            Err(e) => {
                log_skipped("signup achievement check", user_id, &e);
                Vec::new()
            }
        };

        if let Some(last) = unlocked.last() {
            user.xp = last.xp_grant.total_xp;
            user.rank_level = user.rank_level.max(last.xp_grant.rank.level);
        }

        Ok((user, unlocked))
    }

    /// Add XP to a user, re-resolve their rank, and run the `level_reach`
    /// pass if the rank changed.
    pub fn grant_xp(&self, user_id: Uuid, amount: i64) -> Result<XpOutcome, GamificationError> {
        if amount < 0 {
            return Err(ProgressionError::NegativeXp(amount).into());
        }

        let tx = self.db.immediate_transaction()?;
        let grant = self.ledger.apply(&tx, user_id, amount)?;
        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        if !grant.rank_changed() {
            return Ok(XpOutcome {
                grant,
                unlocked: Vec::new(),
            });
        }

        // The grant is committed; a failed level pass must not report it as
        // lost.
        let unlocked = match self.evaluator.check_and_unlock(
            user_id,
            CriteriaType::LevelReach,
            grant.rank.level as i64,
        ) {
            Ok(unlocked) => unlocked,
            Err(e) => {
                log_skipped("level achievement check", user_id, &GamificationError::from(e));
                Vec::new()
            }
        };

        Ok(XpOutcome { grant, unlocked })
    }

    /// Add to a single score scope without touching XP or rank.
    pub fn increment_score(
        &self,
        user_id: Uuid,
        amount: i64,
        scope: Scope,
    ) -> Result<i64, GamificationError> {
        Ok(self.scores.increment_score(user_id, amount, scope)?)
    }

    /// Rank for a cumulative XP value.
    pub fn resolve_rank(&self, xp: i64) -> &Rank {
        self.ledger.ranks().resolve(xp)
    }

    /// Report a tracked counter's new value and unlock what it satisfies.
    pub fn record_progress(
        &self,
        user_id: Uuid,
        criteria: CriteriaType,
        current_value: i64,
    ) -> Result<Vec<AchievementUnlocked>, GamificationError> {
        Ok(self
            .evaluator
            .check_and_unlock(user_id, criteria, current_value)?)
    }

    /// [`GamificationEngine::record_progress`] for a criteria name.
    pub fn record_progress_named(
        &self,
        user_id: Uuid,
        criteria: &str,
        current_value: i64,
    ) -> Result<Vec<AchievementUnlocked>, GamificationError> {
        Ok(self
            .evaluator
            .check_and_unlock_named(user_id, criteria, current_value)?)
    }

    /// Evaluate `user_id_below` achievements against the signup number.
    pub fn evaluate_signup(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AchievementUnlocked>, GamificationError> {
        let user = self
            .db
            .get_user(&user_id)?
            .ok_or(GamificationError::UnknownUser(user_id))?;

        self.record_progress(user_id, CriteriaType::UserIdBelow, user.seq)
    }

    /// Grant XP as a side effect of another operation. Failures are logged
    /// and swallowed so the caller's primary operation proceeds.
    pub fn grant_xp_best_effort(&self, user_id: Uuid, amount: i64) -> Option<XpOutcome> {
        match self.grant_xp(user_id, amount) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log_skipped("XP grant", user_id, &e);
                None
            }
        }
    }

    /// Increment a score as a side effect of another operation. Failures are
    /// logged and swallowed.
    pub fn increment_score_best_effort(
        &self,
        user_id: Uuid,
        amount: i64,
        scope: Scope,
    ) -> Option<i64> {
        match self.increment_score(user_id, amount, scope) {
            Ok(total) => Some(total),
            Err(e) => {
                log_skipped("score increment", user_id, &e);
                None
            }
        }
    }

    /// Record progress as a side effect of another operation. Failures are
    /// logged and swallowed.
    pub fn record_progress_best_effort(
        &self,
        user_id: Uuid,
        criteria: CriteriaType,
        current_value: i64,
    ) -> Option<Vec<AchievementUnlocked>> {
        match self.record_progress(user_id, criteria, current_value) {
            Ok(unlocked) => Some(unlocked),
            Err(e) => {
                log_skipped("achievement check", user_id, &e);
                None
            }
        }
    }

    /// A user with their rank progress, resolved from XP rather than the
    /// stored rank level.
    pub fn user_progress(&self, user_id: Uuid) -> Result<Option<UserProgress>, GamificationError> {
        Ok(self.db.get_user(&user_id)?.map(|user| UserProgress {
            progress: self.ledger.ranks().progress(user.xp),
            user,
        }))
    }

    /// Every achievement with the user's unlock state.
    pub fn user_achievements(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AchievementStatus>, GamificationError> {
        Ok(self.evaluator.list_user_achievements(user_id)?)
    }

    /// Top `limit` users in `scope`. May lag writes by up to the cache TTL.
    pub fn get_top(
        &self,
        limit: usize,
        scope: Scope,
    ) -> Result<Vec<LeaderboardEntry>, GamificationError> {
        Ok(self.leaderboards.get_top(limit, scope)?)
    }

    /// 1-based leaderboard position, `None` if unranked.
    pub fn get_user_rank(
        &self,
        user_id: Uuid,
        scope: Scope,
    ) -> Result<Option<u32>, GamificationError> {
        Ok(self.leaderboards.get_user_rank(user_id, scope)?)
    }

    pub fn standing(
        &self,
        user_id: Uuid,
        scope: Scope,
    ) -> Result<Option<Standing>, GamificationError> {
        Ok(self.leaderboards.standing(user_id, scope)?)
    }

    /// Drop the cached leaderboard so the next read reflects the store.
    pub fn invalidate_leaderboard(&self, scope: Scope) -> bool {
        self.leaderboards.invalidate(scope)
    }

    /// Clear weekly scores at the week boundary.
    pub fn reset_weekly(&self) -> Result<usize, GamificationError> {
        let cleared = self.scores.reset_scope(Scope::Weekly)?;
        self.leaderboards.invalidate(Scope::Weekly);
        Ok(cleared)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn scores(&self) -> &ScoreStore {
        &self.scores
    }

    pub fn achievements(&self) -> &AchievementEvaluator {
        &self.evaluator
    }

    pub fn leaderboards(&self) -> &LeaderboardService {
        &self.leaderboards
    }
}

fn log_skipped(operation: &str, user_id: Uuid, error: &GamificationError) {
    if error.is_transient() {
        tracing::warn!("Skipped {} for user {}: {}", operation, user_id, error);
    } else {
        tracing::error!("Rejected {} for user {}: {}", operation, user_id, error);
    }
}

/// Top-level gamification errors.
#[derive(Debug, thiserror::Error)]
pub enum GamificationError {
    #[error("User not found: {0}")]
    UnknownUser(Uuid),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] DatabaseError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Progression(#[from] ProgressionError),

    #[error(transparent)]
    Achievement(#[from] AchievementError),

    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}

impl GamificationError {
    /// Store or cache unavailability; safe to skip for non-critical paths.
    pub fn is_transient(&self) -> bool {
        self.store_error().is_some_and(DatabaseError::is_transient)
    }

    /// Whether the caller passed something invalid.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            GamificationError::UnknownUser(_)
                | GamificationError::Score(ScoreError::NegativeAmount(_))
                | GamificationError::Score(ScoreError::UnknownScope(_))
                | GamificationError::Progression(ProgressionError::NegativeXp(_))
                | GamificationError::Progression(ProgressionError::UnknownUser(_))
                | GamificationError::Achievement(AchievementError::NegativeValue(_))
                | GamificationError::Achievement(AchievementError::UnknownCriteria(_))
                | GamificationError::Achievement(AchievementError::UnknownUser(_))
        )
    }

    fn store_error(&self) -> Option<&DatabaseError> {
        match self {
            GamificationError::Store(e) => Some(e),
            GamificationError::Score(ScoreError::Store(e)) => Some(e),
            GamificationError::Progression(ProgressionError::Store(e)) => Some(e),
            GamificationError::Progression(ProgressionError::Score(ScoreError::Store(e))) => {
                Some(e)
            }
            GamificationError::Achievement(AchievementError::Store(e)) => Some(e),
            GamificationError::Achievement(AchievementError::Progression(
                ProgressionError::Store(e),
            )) => Some(e),
            GamificationError::Achievement(AchievementError::Progression(
                ProgressionError::Score(ScoreError::Store(e)),
            )) => Some(e),
            GamificationError::Leaderboard(LeaderboardError::Store(e)) => Some(e),
            _ => None,
        }
    }
}
