//! Configuration loading and store preparation

use gamecore::ranks::RankError;
use gamecore::storage::config::{load_config_from, save_config, ConfigError};
use gamecore::{GamificationContext, GamificationError};
use uuid::Uuid;

use crate::common::file_config;

#[test]
fn test_saved_config_drives_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    save_config(&file_config(dir.path()), &path).unwrap();

    let ctx = GamificationContext::new(load_config_from(&path).unwrap()).unwrap();
    assert_eq!(ctx.ranks().len(), 3);
    assert_eq!(ctx.catalog().len(), 1);

    let engine = ctx.open_prepared().unwrap();
    assert_eq!(engine.database().load_ranks().unwrap().len(), 3);
    assert!(dir.path().join("game.db").exists());
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = GamificationContext::new(file_config(dir.path())).unwrap();
    let user_id = Uuid::new_v4();

    {
        let engine = ctx.open_prepared().unwrap();
        engine.register_user(user_id, "Persistent").unwrap();
        engine.grant_xp(user_id, 120).unwrap();
    }

    // Preparing again must not duplicate definitions or touch user data.
    let engine = ctx.open_prepared().unwrap();
    let progress = engine.user_progress(user_id).unwrap().unwrap();
    assert_eq!(progress.user.xp, 120);
    assert_eq!(progress.user.rank_level, 2);
    assert_eq!(engine.user_achievements(user_id).unwrap().len(), 1);
}

#[test]
fn test_duplicate_rank_thresholds_rejected_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = file_config(dir.path());
    config.ranks[2].min_xp = 100;

    let err = match GamificationContext::new(config) {
        Err(e) => e,
        Ok(_) => panic!("duplicate thresholds accepted"),
    };
    assert!(matches!(
        err,
        GamificationError::Config(ConfigError::Ranks(RankError::DuplicateThreshold { .. }))
    ));
    assert!(!dir.path().join("game.db").exists());
}
