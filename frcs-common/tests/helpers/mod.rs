//! Shared fixtures for frcs-common integration tests

#![allow(dead_code)]

use frcs_common::store::RecordStore;
use frcs_common::{codec, time, FieldSchema, ObservationRecord};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh store in its own temporary directory (keep the TempDir alive)
pub async fn temp_store() -> (TempDir, RecordStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = RecordStore::open(&dir.path().join("scouting_data.db"), Arc::new(FieldSchema::builtin()))
        .await
        .expect("open store");
    (dir, store)
}

/// Minimal valid payload for the built-in schema
pub fn payload(match_number: u32, team_number: u32, alliance: &str, scouter: &str) -> Value {
    json!({
        "timestamp": "2024-03-02T10:15:00.000Z",
        "match_number": match_number,
        "team_number": team_number,
        "alliance": alliance,
        "scouter_name": scouter,
        "auto_balls_scored_upper": 2,
        "auto_taxi": true,
        "teleop_balls_scored_upper": 10,
        "climb_level": "Mid",
    })
}

/// Copy of `payload` with one field overridden
pub fn with(mut payload: Value, field: &str, value: Value) -> Value {
    payload[field] = value;
    payload
}

/// Decode and validate a payload into a record
pub fn record(payload: &Value) -> ObservationRecord {
    let schema = FieldSchema::builtin();
    let fields = codec::decode(&schema, &payload.to_string()).expect("decode");
    ObservationRecord::from_fields(&schema, fields, time::now()).expect("validate")
}

/// Make every insert into `table` fail, as a full disk would
pub async fn fail_inserts_into(store: &RecordStore, table: &str) {
    sqlx::query(&format!(
        "CREATE TRIGGER fail_insert_{table} BEFORE INSERT ON {table} \
         BEGIN SELECT RAISE(ABORT, 'disk full'); END"
    ))
    .execute(store.pool())
    .await
    .expect("install trigger");
}

pub async fn clear_insert_failure(store: &RecordStore, table: &str) {
    sqlx::query(&format!("DROP TRIGGER fail_insert_{table}"))
        .execute(store.pool())
        .await
        .expect("drop trigger");
}
