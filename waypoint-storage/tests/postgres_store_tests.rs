//! PostgreSQL roadmap store integration tests.
//!
//! Require a reachable database configured through `WAYPOINT_DB_*` and run
//! only with `--features db-tests`.
#![cfg(feature = "db-tests")]

use chrono::{Duration, Utc};
use waypoint_core::{RoadmapPayload, RoadmapStep};
use waypoint_storage::{DbConfig, PostgresRoadmapStore, RoadmapStore};

async fn test_store() -> PostgresRoadmapStore {
    let store = PostgresRoadmapStore::from_config(&DbConfig::from_env())
        .expect("Failed to create database pool");
    store.ensure_schema().await.expect("Failed to ensure schema");
    store
}

fn unique_key(prefix: &str) -> String {
    format!("{} {}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn payload(program: &str) -> RoadmapPayload {
    RoadmapPayload::new(
        program,
        vec![RoadmapStep::new(1, "Foundations", None, vec!["Calculus".to_string()])],
        Utc::now(),
    )
}

#[tokio::test]
async fn test_upsert_and_get_live() {
    let store = test_store().await;
    let key = unique_key("Data Science");
    let now = Utc::now();

    let v1 = store.upsert(&key, &payload(&key), now, now + Duration::hours(1)).await.unwrap();
    let v2 = store.upsert(&key, &payload(&key), now, now + Duration::hours(1)).await.unwrap();
    assert_eq!(v2, v1 + 1);

    let entry = store.get_live(&key, now).await.unwrap().unwrap();
    assert_eq!(entry.payload.program, key);
    assert!(store.get_live(&key, now + Duration::hours(2)).await.unwrap().is_none());

    assert!(store.delete(&key).await.unwrap());
}

#[tokio::test]
async fn test_record_access_and_extend_ttl() {
    let store = test_store().await;
    let key = unique_key("Physics");
    let now = Utc::now();
    store.upsert(&key, &payload(&key), now, now + Duration::minutes(5)).await.unwrap();

    store.record_access(&key, now).await.unwrap();
    store.record_access(&key, now).await.unwrap();
    assert!(store.extend_ttl(&key, now, now + Duration::hours(1)).await.unwrap());

    let entry = store.get_live(&key, now + Duration::minutes(30)).await.unwrap().unwrap();
    assert_eq!(entry.hit_count, 2);
    assert!(entry.last_accessed_at.is_some());

    store.delete(&key).await.unwrap();
}

#[tokio::test]
async fn test_delete_expired_removes_past_rows() {
    let store = test_store().await;
    let key = unique_key("Expired");
    let past = Utc::now() - Duration::hours(3);
    store.upsert(&key, &payload(&key), past, past + Duration::hours(1)).await.unwrap();

    let removed = store.delete_expired(Utc::now()).await.unwrap();

    assert!(removed >= 1);
    assert!(!store.delete(&key).await.unwrap());
}

#[tokio::test]
async fn test_ping() {
    let store = test_store().await;
    store.ping().await.unwrap();
}
