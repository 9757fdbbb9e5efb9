//! Property tests over random increment sequences

use gamecore::scores::Scope;
use gamecore::GamificationContext;
use proptest::prelude::*;
use uuid::Uuid;

use crate::common::{memory_engine, small_config};

const USERS: usize = 4;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn scores_equal_sum_of_increments(
        increments in prop::collection::vec((0..USERS, 0i64..500), 1..60)
    ) {
        let ctx = GamificationContext::new(small_config()).unwrap();
        let engine = memory_engine(&ctx);
        let users: Vec<Uuid> = (0..USERS)
            .map(|i| engine.register_user(Uuid::new_v4(), &format!("User {i}")).unwrap().0.id)
            .collect();

        let mut expected = [0i64; USERS];
        for (idx, amount) in &increments {
            let total = engine.increment_score(users[*idx], *amount, Scope::Weekly).unwrap();
            expected[*idx] += amount;
            prop_assert_eq!(total, expected[*idx]);
        }

        for (idx, user) in users.iter().enumerate() {
            let stored = engine.scores().score(*user, Scope::Weekly).unwrap().unwrap_or(0);
            prop_assert_eq!(stored, expected[idx]);
        }

        let top = engine.get_top(USERS, Scope::Weekly).unwrap();
        prop_assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
        for entry in &top {
            prop_assert_eq!(engine.get_user_rank(entry.user_id, Scope::Weekly).unwrap(), Some(entry.position));
        }
    }

    #[test]
    fn xp_grants_keep_rank_in_step(amounts in prop::collection::vec(0i64..120, 1..20)) {
        let ctx = GamificationContext::new(small_config()).unwrap();
        let engine = memory_engine(&ctx);
        let (user, _) = engine.register_user(Uuid::new_v4(), "Grinder").unwrap();

        let mut last_level = 1;
        for amount in amounts {
            let outcome = engine.grant_xp(user.id, amount).unwrap();
            prop_assert!(outcome.rank().level >= last_level);
            last_level = outcome.rank().level;
        }

        let progress = engine.user_progress(user.id).unwrap().unwrap();
        prop_assert_eq!(progress.user.rank_level, progress.progress.current.level);
        prop_assert_eq!(ctx.ranks().resolve(progress.user.xp).level, last_level);
    }
}
