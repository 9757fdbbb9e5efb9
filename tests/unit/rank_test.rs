//! Unit tests for rank resolution

use gamecore::ranks::{default_ranks, Rank, RankError, RankTable};
use proptest::prelude::*;

fn three_tiers() -> RankTable {
    RankTable::new(vec![
        Rank::new(1, "Novice", 0),
        Rank::new(2, "Apprentice", 100),
        Rank::new(3, "Explorer", 250),
    ])
    .unwrap()
}

/// Reference resolution: highest tier whose threshold is not above `xp`.
fn linear_resolve(tiers: &[Rank], xp: i64) -> &Rank {
    tiers
        .iter()
        .filter(|r| r.min_xp <= xp)
        .max_by_key(|r| r.min_xp)
        .unwrap_or(&tiers[0])
}

#[test]
fn test_resolve_three_tier_table() {
    let table = three_tiers();

    assert_eq!(table.resolve(0).name, "Novice");
    assert_eq!(table.resolve(99).name, "Novice");
    assert_eq!(table.resolve(100).name, "Apprentice");
    assert_eq!(table.resolve(10_000).name, "Explorer");
}

#[test]
fn test_threshold_belongs_to_its_tier() {
    let table = three_tiers();

    assert_eq!(table.resolve(249).level, 2);
    assert_eq!(table.resolve(250).level, 3);
    assert_eq!(table.resolve(251).level, 3);
}

#[test]
fn test_unsorted_input_is_sorted() {
    let table = RankTable::new(vec![
        Rank::new(3, "Explorer", 250),
        Rank::new(1, "Novice", 0),
        Rank::new(2, "Apprentice", 100),
    ])
    .unwrap();

    let levels: Vec<u32> = table.tiers().iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![1, 2, 3]);
}

#[test]
fn test_load_time_validation() {
    assert_eq!(RankTable::new(Vec::new()).unwrap_err(), RankError::Empty);

    let duplicate = RankTable::new(vec![
        Rank::new(1, "Novice", 0),
        Rank::new(2, "Apprentice", 100),
        Rank::new(3, "Also Apprentice", 100),
    ]);
    assert!(matches!(
        duplicate,
        Err(RankError::DuplicateThreshold { min_xp: 100, .. })
    ));

    let no_base = RankTable::new(vec![Rank::new(1, "Novice", 10)]);
    assert!(matches!(no_base, Err(RankError::InvalidBaseTier { .. })));

    let inverted = RankTable::new(vec![
        Rank::new(1, "Novice", 0),
        Rank::new(3, "Explorer", 100),
        Rank::new(2, "Apprentice", 250),
    ]);
    assert!(matches!(inverted, Err(RankError::LevelOrder { level: 2, .. })));
}

#[test]
fn test_progress_at_top_tier() {
    let table = three_tiers();
    let progress = table.progress(400);

    assert_eq!(progress.current.name, "Explorer");
    assert!(progress.next.is_none());
    assert_eq!(progress.xp_to_next, None);
    assert_eq!(progress.xp_into_tier, 150);
    assert!((progress.percentage() - 100.0).abs() < f32::EPSILON);
}

#[test]
fn test_progress_mid_tier() {
    let table = three_tiers();
    let progress = table.progress(175);

    assert_eq!(progress.current.name, "Apprentice");
    assert_eq!(progress.next.as_ref().map(|r| r.name.as_str()), Some("Explorer"));
    assert_eq!(progress.xp_to_next, Some(75));
    assert!((progress.percentage() - 50.0).abs() < 0.01);
}

proptest! {
    #[test]
    fn resolve_matches_linear_scan(xp in 0i64..10_000) {
        let table = RankTable::new(default_ranks()).unwrap();
        prop_assert_eq!(table.resolve(xp), linear_resolve(table.tiers(), xp));
    }

    #[test]
    fn resolve_is_monotonic(a in 0i64..100_000, b in 0i64..100_000) {
        let table = RankTable::new(default_ranks()).unwrap();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(table.resolve(low).level <= table.resolve(high).level);
    }

    #[test]
    fn resolved_tier_contains_xp(xp in 0i64..100_000) {
        let table = RankTable::new(default_ranks()).unwrap();
        let rank = table.resolve(xp);
        prop_assert!(rank.min_xp <= xp);
        if let Some(next) = table.next_rank(xp) {
            prop_assert!(xp < next.min_xp);
        }
    }
}
