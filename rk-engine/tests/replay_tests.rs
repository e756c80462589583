//! Replay driver tests

mod helpers;

use helpers::*;
use rk_common::SubjectId;
use rk_engine::store::{InMemoryTagStore, StoreSnapshot};
use rk_engine::{replay, Engine};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

async fn replay_lines(engine: &Engine, input: &str) -> Vec<Value> {
    let mut out = Vec::new();
    replay::run(engine, input.as_bytes(), &mut out).await.unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn types(lines: &[Value]) -> Vec<&str> {
    lines.iter().filter_map(|l| l["type"].as_str()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_replay_flushes_open_bursts_before_returning() {
    let store = store_with(&[(1, &[NO_DAMAGE])]).await;
    let engine = Engine::new(config(), store.clone()).unwrap();

    let input = r#"
{"cmd": "toggle", "subject": 1, "tag": 31, "add": true}
{"cmd": "toggle", "subject": 1, "tag": 31, "add": false}
{"cmd": "toggle", "subject": 1, "tag": 32, "add": true}
"#;
    let lines = replay_lines(&engine, input).await;

    assert_eq!(types(&lines), vec!["TagsCommitted", "ToggleSummary"]);
    assert_eq!(lines[1]["added"], serde_json::json!([32]));
    assert!(store.tags_of(SubjectId(1)).await.unwrap().contains(&COOP));
}

#[tokio::test(start_paused = true)]
async fn test_replay_reports_results_and_errors() {
    let store = store_with(&[(1, &[ALL_BOSSES]), (2, &[])]).await;
    let engine = Engine::new(config(), store.clone()).unwrap();

    let input = r#"
# comment lines are skipped
{"cmd": "reconcile", "subject": 2}
{"cmd": "toggle", "subject": 1, "tag": 10, "add": true}
not json
{"cmd": "leaderboard"}
{"cmd": "depart", "subject": 2}
"#;
    let lines = replay_lines(&engine, input).await;

    assert_eq!(
        types(&lines),
        vec![
            "TagsCommitted",
            "ReconcileResult",
            "CommandError",
            "CommandError",
            "Leaderboard",
            "SubjectExpired",
        ]
    );
    assert_eq!(lines[1]["outcome"], "written");
    assert_eq!(lines[4]["entries"][0]["score"], 50);
    assert_eq!(lines[4]["entries"][0]["subjects"], serde_json::json!([1]));
}

#[tokio::test(start_paused = true)]
async fn test_replay_against_snapshot_file() {
    let fixture = store_with(&[(1, &[]), (2, &[LOUNGE, FIRST_CLEAR])]).await;
    fixture
        .set_joined(SubjectId(1), rk_common::time::now() - chrono::Duration::days(30))
        .await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, serde_json::to_string(&fixture.snapshot().await).unwrap()).unwrap();

    let snapshot = StoreSnapshot::load(&path).await.unwrap();
    assert_eq!(snapshot.subjects.len(), 2);
    assert!(snapshot.subjects[0].joined_at.is_some());
    let store = Arc::new(InMemoryTagStore::from_snapshot(snapshot));
    let engine = Engine::new(config(), store.clone()).unwrap();

    let lines = replay_lines(&engine, r#"{"cmd": "sweep"}"#).await;
    let result = lines.iter().find(|l| l["type"] == "SweepResult").unwrap();
    assert_eq!(result["checked"], 2);
    assert_eq!(
        store.tags_of(SubjectId(2)).await.unwrap(),
        set(&[
            NOT_AVAILABLE,
            PERSON,
            LOUNGE,
            INTERESTS,
            NO_INTERESTS,
            CHALLENGES,
            FIRST_CLEAR
        ])
    );
}

#[tokio::test]
async fn test_malformed_snapshot_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, "{\"declared\": [").unwrap();

    let result = StoreSnapshot::load(&path).await;
    assert!(matches!(result, Err(rk_common::Error::InvalidInput(_))));

    let missing = StoreSnapshot::load(&dir.path().join("absent.json")).await;
    assert!(matches!(missing, Err(rk_common::Error::Io(_))));
}
