//! Tests del store PostgreSQL.
//!
//! Necesitan una base real: `DATABASE_URL=... cargo test -- --ignored`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use fleet_telemetry_sync::config::database::DatabaseConfig;
use fleet_telemetry_sync::database::DatabaseConnection;
use fleet_telemetry_sync::models::history::{HistoryEntry, HistoryQuery};
use fleet_telemetry_sync::models::vehicle_state::{VehicleState, VehicleStatus};
use fleet_telemetry_sync::repositories::{PgTelemetryStore, TelemetryStore};

async fn connect() -> (PgTelemetryStore, PgPool) {
    let config = DatabaseConfig::from_env().unwrap();
    let connection = DatabaseConnection::connect(&config).await.unwrap();
    let pool = connection.pool().clone();
    (PgTelemetryStore::new(pool.clone()), pool)
}

fn unique_vehicle() -> String {
    format!("test-{}", Uuid::new_v4())
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

fn entry(minute: i64) -> HistoryEntry {
    HistoryEntry::new(base_time() + Duration::minutes(minute), json!({ "minute": minute }))
}

async fn cleanup(pool: &PgPool, vehicle_id: &str) {
    sqlx::query("DELETE FROM vehicle_history WHERE vehicle_id = $1")
        .bind(vehicle_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM vehicle_states WHERE vehicle_id = $1")
        .bind(vehicle_id)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_upsert_replaces_state() {
    let (store, pool) = connect().await;
    let vehicle_id = unique_vehicle();

    let mut state = VehicleState::empty(vehicle_id.clone(), base_time());
    state.status = Some(VehicleStatus::Idle);
    store.upsert_state(&state).await.unwrap();

    state.status = Some(VehicleStatus::Running);
    state.last_update = base_time() + Duration::minutes(1);
    store.upsert_state(&state).await.unwrap();

    let stored = store.find_state(&vehicle_id).await.unwrap().unwrap();
    assert_eq!(stored.status, Some(VehicleStatus::Running));
    assert_eq!(stored.last_update, base_time() + Duration::minutes(1));
    assert!(store.find_state(&unique_vehicle()).await.unwrap().is_none());

    cleanup(&pool, &vehicle_id).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_history_dedups_and_evicts_oldest() {
    let (store, pool) = connect().await;
    let vehicle_id = unique_vehicle();
    let cap = 5;

    assert!(store.append_history(&vehicle_id, &entry(0), cap).await.unwrap());
    // misma marca de tiempo: no se duplica
    assert!(!store.append_history(&vehicle_id, &entry(0), cap).await.unwrap());

    for minute in 1..=cap as i64 {
        assert!(store.append_history(&vehicle_id, &entry(minute), cap).await.unwrap());
    }

    let all = HistoryQuery {
        limit: Some(100),
        ..HistoryQuery::default()
    };
    let retained = store.query_history(&vehicle_id, &all).await.unwrap();
    let minutes: Vec<i64> = retained
        .iter()
        .map(|e| (e.timestamp - base_time()).num_minutes())
        .collect();
    assert_eq!(minutes, vec![5, 4, 3, 2, 1]);

    // más antigua que todo lo retenido con el historial lleno
    assert!(!store.append_history(&vehicle_id, &entry(-10), cap).await.unwrap());
    assert_eq!(store.query_history(&vehicle_id, &all).await.unwrap().len(), cap);

    let latest = store.latest_history(&vehicle_id).await.unwrap().unwrap();
    assert_eq!(latest.sample, json!({ "minute": 5 }));

    cleanup(&pool, &vehicle_id).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_pg_history_window_and_limit() {
    let (store, pool) = connect().await;
    let vehicle_id = unique_vehicle();
    for minute in 0..10 {
        store.append_history(&vehicle_id, &entry(minute), 100).await.unwrap();
    }

    let window = HistoryQuery {
        from: Some(base_time() + Duration::minutes(2)),
        to: Some(base_time() + Duration::minutes(6)),
        limit: None,
    };
    let entries = store.query_history(&vehicle_id, &window).await.unwrap();
    let minutes: Vec<i64> = entries
        .iter()
        .map(|e| (e.timestamp - base_time()).num_minutes())
        .collect();
    assert_eq!(minutes, vec![6, 5, 4, 3, 2]);

    let limited = HistoryQuery {
        from: Some(base_time() + Duration::minutes(2)),
        to: None,
        limit: Some(3),
    };
    let entries = store.query_history(&vehicle_id, &limited).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].timestamp, base_time() + Duration::minutes(9));

    assert!(store
        .query_history(&unique_vehicle(), &HistoryQuery::default())
        .await
        .unwrap()
        .is_empty());

    cleanup(&pool, &vehicle_id).await;
}
