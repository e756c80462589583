//! Engine facade tests: sweeps, leaderboard, departure

mod helpers;

use chrono::Duration as ChronoDuration;
use helpers::*;
use rk_common::events::EngineEvent;
use rk_common::SubjectId;
use rk_engine::store::TagMeta;
use rk_engine::{CommitOutcome, Engine, Error, StoreError};

#[tokio::test]
async fn test_invalid_config_rejected() {
    let store = store_with(&[]).await;
    let mut config = config();
    config.tags.person = Some(LEADER);

    let result = Engine::new(config, store);
    assert!(matches!(result, Err(Error::Common(_))));
}

#[tokio::test]
async fn test_full_sweep_continues_past_failures() {
    let store = store_with(&[
        (1, &[LEADER, LOUNGE]),
        (2, &[NOT_AVAILABLE, PERSON, INTERESTS, NO_INTERESTS]),
        (3, &[AVAILABLE]),
    ])
    .await;
    store
        .fail_writes(SubjectId(1), StoreError::Conflict("edited concurrently".to_string()))
        .await;
    let engine = Engine::new(config(), store.clone()).unwrap();
    let mut rx = engine.events().subscribe();

    let report = engine.reconcile_all().await.unwrap();

    assert_eq!(report.checked, 3);
    assert_eq!(report.failed, vec![SubjectId(1)]);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.written, vec![SubjectId(3)]);

    let events = drain(&mut rx);
    assert_eq!(of_type(&events, "CommitFailed").len(), 1);
    assert_eq!(
        store.tags_of(SubjectId(3)).await.unwrap(),
        set(&[AVAILABLE, PERSON, AVAILABLE_NOT_IN_LOUNGE, INTERESTS, NO_INTERESTS])
    );
}

#[tokio::test]
async fn test_full_sweep_asserts_ensured_tags() {
    let store = store_with(&[(1, &[])]).await;
    let mut config = config();
    config.sweep.ensure_tags = vec![PERSON, MARATHONS];
    let engine = Engine::new(config, store.clone()).unwrap();

    let report = engine.reconcile_all().await.unwrap();
    assert_eq!(report.written, vec![SubjectId(1)]);
    let tags = store.tags_of(SubjectId(1)).await.unwrap();
    assert!(tags.contains(&MARATHONS));
    assert!(!tags.contains(&NO_INTERESTS));

    assert_eq!(engine.reconcile(SubjectId(1)).await.unwrap(), CommitOutcome::Unchanged);
}

#[tokio::test]
async fn test_full_sweep_fails_fast_on_bad_hierarchy() {
    let store = store_with(&[(1, &[])]).await;
    let mut declared = declared();
    declared.push(TagMeta::new(35, "🚫 none", 25));
    declared.retain(|t| t.id != CHALLENGES);
    store.declare(declared).await;
    let engine = Engine::new(config(), store.clone()).unwrap();

    let result = engine.reconcile_all().await;
    assert!(matches!(result, Err(Error::InvalidHierarchy(_))));
    assert_eq!(store.write_count().await, 0);
}

#[tokio::test]
async fn test_full_sweep_drops_newbie_after_a_week() {
    const SETTLED: [rk_common::TagId; 5] = [NEWBIE, NOT_AVAILABLE, PERSON, INTERESTS, NO_INTERESTS];
    let store = store_with(&[(1, &SETTLED), (2, &SETTLED), (3, &SETTLED), (4, &SETTLED)]).await;
    let now = rk_common::time::now();
    store.set_joined(SubjectId(1), now - ChronoDuration::days(8)).await;
    store.set_joined(SubjectId(2), now - ChronoDuration::days(6)).await;
    // Seven whole days is not yet past the limit
    store
        .set_joined(SubjectId(3), now - ChronoDuration::days(7) - ChronoDuration::hours(23))
        .await;
    let engine = Engine::new(config(), store.clone()).unwrap();

    for id in 1..=4 {
        engine.reconcile_at(SubjectId(id), now).await.unwrap();
    }

    assert_eq!(
        store.tags_of(SubjectId(1)).await.unwrap(),
        set(&[NOT_AVAILABLE, PERSON, INTERESTS, NO_INTERESTS])
    );
    for id in 2..=4 {
        assert!(store.tags_of(SubjectId(id)).await.unwrap().contains(&NEWBIE));
    }
    assert_eq!(store.write_count().await, 1);
}

#[tokio::test]
async fn test_newbie_untouched_when_unconfigured() {
    let store = store_with(&[(1, &[NEWBIE, NOT_AVAILABLE, PERSON, INTERESTS, NO_INTERESTS])]).await;
    store
        .set_joined(SubjectId(1), rk_common::time::now() - ChronoDuration::days(30))
        .await;
    let mut config = config();
    config.tags.newbie = None;
    let engine = Engine::new(config, store.clone()).unwrap();

    let report = engine.reconcile_all().await.unwrap();
    assert_eq!(report.unchanged, 1);
    assert!(store.tags_of(SubjectId(1)).await.unwrap().contains(&NEWBIE));
}

#[tokio::test]
async fn test_inactivity_sweep() {
    let store = store_with(&[
        // idle two hours, available
        (1, &[AVAILABLE, PERSON, AVAILABLE_NOT_IN_LOUNGE, INTERESTS, NO_INTERESTS]),
        // never seen
        (2, &[NOT_AVAILABLE, PERSON, INTERESTS, NO_INTERESTS]),
        // never seen but in the lounge
        (3, &[LOUNGE, NOT_AVAILABLE, PERSON, INTERESTS, NO_INTERESTS]),
        // active a minute ago
        (4, &[AVAILABLE, PERSON, AVAILABLE_NOT_IN_LOUNGE, INTERESTS, NO_INTERESTS]),
    ])
    .await;
    let engine = Engine::new(config(), store.clone()).unwrap();
    let mut rx = engine.events().subscribe();
    let now = rk_common::time::now();

    engine.activity().touch_at(SubjectId(1), now - ChronoDuration::hours(2)).await;
    engine.activity().touch_at(SubjectId(4), now - ChronoDuration::minutes(1)).await;

    let report = engine.sweep_inactivity_at(now).await.unwrap();

    assert_eq!(report.checked, 4);
    assert_eq!(report.skipped_in_group, 1);
    assert_eq!(report.marked_unavailable, vec![SubjectId(1)]);
    assert_eq!(report.marked_inactive, vec![SubjectId(2)]);

    assert_eq!(
        store.tags_of(SubjectId(1)).await.unwrap(),
        set(&[NOT_AVAILABLE, PERSON, INTERESTS, NO_INTERESTS])
    );
    assert_eq!(
        store.tags_of(SubjectId(2)).await.unwrap(),
        set(&[INACTIVE, INTERESTS, NO_INTERESTS])
    );
    assert_eq!(store.write_count().await, 2);

    let events = drain(&mut rx);
    assert_eq!(of_type(&events, "MarkedUnavailable").len(), 1);
    assert_eq!(of_type(&events, "MarkedInactive").len(), 1);

    // Nothing left to demote
    let again = engine.sweep_inactivity_at(now).await.unwrap();
    assert!(again.marked_unavailable.is_empty());
    assert!(again.marked_inactive.is_empty());
}

#[tokio::test]
async fn test_backfill_keeps_newest_activity() {
    let store = store_with(&[(1, &[AVAILABLE])]).await;
    let engine = Engine::new(config(), store.clone()).unwrap();
    let now = rk_common::time::now();

    engine.record_activity(SubjectId(1), Some(now - ChronoDuration::minutes(10))).await;
    engine.record_activity(SubjectId(1), Some(now - ChronoDuration::days(3))).await;

    let report = engine.sweep_inactivity_at(now).await.unwrap();
    assert!(report.marked_unavailable.is_empty());
}

#[tokio::test]
async fn test_leaderboard_ranks_challenge_points() {
    let store = store_with(&[
        (1, &[NO_DAMAGE]),
        (2, &[FIRST_CLEAR, ALL_BOSSES]),
        (3, &[NO_DAMAGE]),
        (4, &[LEADER]),
        (5, &[FIRST_CLEAR]),
    ])
    .await;
    let engine = Engine::new(config(), store.clone()).unwrap();

    let board = engine.leaderboard().await.unwrap();
    let flat: Vec<(usize, u64, Vec<SubjectId>)> = board
        .into_iter()
        .map(|e| (e.rank, e.score, e.subjects))
        .collect();
    assert_eq!(
        flat,
        vec![
            (1, 55, vec![SubjectId(2)]),
            (2, 20, vec![SubjectId(1), SubjectId(3)]),
            (4, 5, vec![SubjectId(5)]),
        ]
    );
}

#[tokio::test]
async fn test_departure_expires_activity() {
    let store = store_with(&[(1, &[])]).await;
    let engine = Engine::new(config(), store.clone()).unwrap();
    let mut rx = engine.events().subscribe();

    engine.record_activity(SubjectId(1), None).await;
    assert!(!engine.subject_departed(SubjectId(1)).await);
    assert!(engine.activity().last_seen(SubjectId(1)).await.is_none());

    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [EngineEvent::SubjectExpired {
            cancelled_burst: false,
            ..
        }]
    ));
}
