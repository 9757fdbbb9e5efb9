//! Concurrent workers sharing one database file

use gamecore::achievements::CriteriaType;
use gamecore::scores::Scope;
use gamecore::GamificationContext;
use std::sync::Barrier;
use std::thread;
use uuid::Uuid;

use crate::common::file_config;

const WORKERS: usize = 8;
const GRANTS_PER_WORKER: i64 = 25;

#[test]
fn test_concurrent_increments_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = GamificationContext::new(file_config(dir.path())).unwrap();

    let setup = ctx.open_prepared().unwrap();
    let (user, _) = setup.register_user(Uuid::new_v4(), "Busy").unwrap();

    let barrier = Barrier::new(WORKERS);
    thread::scope(|s| {
        for _ in 0..WORKERS {
            s.spawn(|| {
                let engine = ctx.open_engine().unwrap();
                barrier.wait();
                for _ in 0..GRANTS_PER_WORKER {
                    engine.grant_xp(user.id, 1).unwrap();
                }
            });
        }
    });

    let expected = WORKERS as i64 * GRANTS_PER_WORKER;
    let progress = setup.user_progress(user.id).unwrap().unwrap();
    assert_eq!(progress.user.xp, expected);
    assert_eq!(
        setup.scores().score(user.id, Scope::Global).unwrap(),
        Some(expected)
    );
    assert_eq!(
        setup.scores().score(user.id, Scope::Weekly).unwrap(),
        Some(expected)
    );

    // 200 XP sits in the Apprentice tier; the stored level must agree.
    assert_eq!(progress.progress.current.name, "Apprentice");
    assert_eq!(progress.user.rank_level, 2);
}

#[test]
fn test_concurrent_score_increments_per_scope() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = GamificationContext::new(file_config(dir.path())).unwrap();

    let setup = ctx.open_prepared().unwrap();
    let (user, _) = setup.register_user(Uuid::new_v4(), "Weekly").unwrap();

    let barrier = Barrier::new(WORKERS);
    thread::scope(|s| {
        for _ in 0..WORKERS {
            s.spawn(|| {
                let engine = ctx.open_engine().unwrap();
                barrier.wait();
                for _ in 0..GRANTS_PER_WORKER {
                    engine.increment_score(user.id, 3, Scope::Weekly).unwrap();
                }
            });
        }
    });

    assert_eq!(
        setup.scores().score(user.id, Scope::Weekly).unwrap(),
        Some(3 * WORKERS as i64 * GRANTS_PER_WORKER)
    );
    assert_eq!(setup.scores().score(user.id, Scope::Global).unwrap(), None);
}

#[test]
fn test_concurrent_unlock_grants_once() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = GamificationContext::new(file_config(dir.path())).unwrap();

    let setup = ctx.open_prepared().unwrap();
    let (user, _) = setup.register_user(Uuid::new_v4(), "Popular").unwrap();

    let barrier = Barrier::new(2);
    let unlocked: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    let engine = ctx.open_engine().unwrap();
                    barrier.wait();
                    engine
                        .record_progress(user.id, CriteriaType::FriendsCount, 5)
                        .unwrap()
                        .len()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(unlocked, 1);
    assert_eq!(
        setup.achievements().unlocked_achievements(user.id).unwrap().len(),
        1
    );
    assert_eq!(setup.user_progress(user.id).unwrap().unwrap().user.xp, 150);
}
