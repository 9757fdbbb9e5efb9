//! Unit tests for achievement criteria and catalog validation

use gamecore::achievements::{
    definitions, Achievement, AchievementCatalog, AchievementError, CriteriaType,
};

#[test]
fn test_criteria_names_round_trip() {
    for criteria in CriteriaType::ALL {
        let parsed: CriteriaType = criteria.as_str().parse().unwrap();
        assert_eq!(parsed, criteria);
    }
}

#[test]
fn test_unknown_criteria_name() {
    let err = "karma_points".parse::<CriteriaType>().unwrap_err();
    assert!(matches!(err, AchievementError::UnknownCriteria(name) if name == "karma_points"));
}

#[test]
fn test_counter_thresholds() {
    let friends = CriteriaType::FriendsCount;
    assert!(!friends.is_met(5, 4));
    assert!(friends.is_met(5, 5));
    assert!(friends.is_met(5, 50));
}

#[test]
fn test_flags_need_a_set_value() {
    let linked = CriteriaType::AccountLinked;
    assert!(!linked.is_met(0, 0));
    assert!(linked.is_met(0, 1));
    assert!(linked.is_met(1, 1));
}

#[test]
fn test_user_id_below() {
    let early = CriteriaType::UserIdBelow;
    assert!(early.is_met(1001, 1));
    assert!(early.is_met(1001, 1000));
    assert!(!early.is_met(1001, 1001));
    assert!(!early.is_met(1001, 0));
}

#[test]
fn test_catalog_rejects_duplicate_ids() {
    let achievements = vec![
        Achievement::new("a", "A", "", CriteriaType::CommentsCount, 1, 10),
        Achievement::new("a", "Again", "", CriteriaType::CommentsCount, 5, 10),
    ];
    assert!(matches!(
        AchievementCatalog::new(achievements),
        Err(AchievementError::DuplicateId(id)) if id == "a"
    ));
}

#[test]
fn test_catalog_rejects_negative_reward() {
    let achievements = vec![Achievement::new(
        "greedy",
        "Greedy",
        "",
        CriteriaType::OrdersCount,
        1,
        -5,
    )];
    assert!(matches!(
        AchievementCatalog::new(achievements),
        Err(AchievementError::InvalidDefinition { .. })
    ));
}

#[test]
fn test_default_catalog_lookup() {
    let catalog = AchievementCatalog::new(definitions::all_achievements()).unwrap();

    let butterfly = catalog.get("social_butterfly").unwrap();
    assert_eq!(butterfly.criteria_type, CriteriaType::FriendsCount);
    assert_eq!(butterfly.criteria_value, 5);
    assert_eq!(butterfly.xp_reward, 150);

    assert!(catalog
        .by_criteria(CriteriaType::LevelReach)
        .iter()
        .all(|a| a.criteria_type == CriteriaType::LevelReach));
}
