//! Ingestion pipeline integration tests

mod helpers;

use frcs_common::ingest::{IngestOutcome, IngestPipeline, RejectReason};
use frcs_common::store::RowTable;
use frcs_common::FieldValue;
use helpers::*;
use serde_json::json;

#[tokio::test]
async fn test_rescan_is_idempotent() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());
    let text = payload(12, 254, "Red", "Ada").to_string();

    let first = pipeline.ingest(&text).await;
    assert_eq!(first.outcome, IngestOutcome::Accepted);
    assert_eq!(first.summary, "Match 12, Team 254");

    let second = pipeline.ingest(&text).await;
    assert_eq!(second.outcome, IngestOutcome::DuplicateIdentical);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.match_records, 1);
    assert_eq!(stats.parked_records, 0);
}

#[tokio::test]
async fn test_key_order_and_whitespace_do_not_matter() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());
    let p = payload(12, 254, "Red", "Ada");

    pipeline.ingest(&serde_json::to_string_pretty(&p).unwrap()).await;
    let again = pipeline.ingest(&frcs_common::codec::encode(&record(&p).to_field_map())).await;
    assert_eq!(again.outcome, IngestOutcome::DuplicateIdentical);
}

#[tokio::test]
async fn test_identical_means_same_fingerprint() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());
    let p = payload(12, 254, "Red", "Ada");
    assert_eq!(pipeline.ingest(&p.to_string()).await.outcome, IngestOutcome::Accepted);

    // Lenient scalar forms and explicit defaults decode to the same record
    let lenient = with(with(with(p.clone(), "match_number", json!("12")), "auto_taxi", json!(1)), "penalties", json!(0));
    assert_eq!(record(&lenient).fingerprint(), record(&p).fingerprint());
    assert_eq!(pipeline.ingest(&lenient.to_string()).await.outcome, IngestOutcome::DuplicateIdentical);

    // Only the scouter differs: a different submission
    let other_scout = with(p.clone(), "scouter_name", json!("Grace"));
    assert_ne!(record(&other_scout).fingerprint(), record(&p).fingerprint());
    assert_eq!(pipeline.ingest(&other_scout.to_string()).await.outcome, IngestOutcome::DuplicateConflicting);
}

#[tokio::test]
async fn test_conflicting_duplicate_is_parked() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());
    let original = payload(12, 254, "Red", "Ada");
    let divergent = with(original.clone(), "auto_balls_scored_upper", json!(5));

    assert_eq!(pipeline.ingest(&original.to_string()).await.outcome, IngestOutcome::Accepted);
    let report = pipeline.ingest(&divergent.to_string()).await;
    assert_eq!(report.outcome, IngestOutcome::DuplicateConflicting);
    assert_eq!(report.summary, "Match 12, Team 254");

    let rows = store.rows_for_key(&record(&original).key).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].row.table, RowTable::Canonical);
    assert_eq!(rows[0].record.attributes["auto_balls_scored_upper"], FieldValue::Integer(2));
    assert_eq!(rows[1].row.table, RowTable::Parked);
    assert_eq!(rows[1].record.attributes["auto_balls_scored_upper"], FieldValue::Integer(5));
}

#[tokio::test]
async fn test_third_divergent_scan_joins_group() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());
    let base = payload(30, 1114, "Blue", "Ada");

    pipeline.ingest(&base.to_string()).await;
    pipeline.ingest(&with(base.clone(), "penalties", json!(1)).to_string()).await;
    let third = pipeline.ingest(&with(base.clone(), "penalties", json!(2)).to_string()).await;
    assert_eq!(third.outcome, IngestOutcome::DuplicateConflicting);

    // Re-scanning a parked duplicate does not park it again
    let rescan = pipeline.ingest(&with(base.clone(), "penalties", json!(1)).to_string()).await;
    assert_eq!(rescan.outcome, IngestOutcome::DuplicateIdentical);

    assert_eq!(store.rows_for_key(&record(&base).key).await.unwrap().len(), 3);
    assert_eq!(store.stats().await.unwrap().conflict_groups, 1);
}

#[tokio::test]
async fn test_rejections_write_nothing() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());

    let malformed = pipeline.ingest("https://example.com/not-a-scouting-qr").await;
    assert_eq!(malformed.outcome, IngestOutcome::Rejected(RejectReason::Malformed));
    assert!(malformed.record.is_none());

    let unknown = with(payload(1, 2, "Red", "Ada"), "robot_weight", json!(120));
    assert_eq!(
        pipeline.ingest(&unknown.to_string()).await.outcome,
        IngestOutcome::Rejected(RejectReason::SchemaMismatch)
    );

    let out_of_bounds = with(payload(1, 2, "Red", "Ada"), "auto_balls_scored_upper", json!(99));
    assert_eq!(
        pipeline.ingest(&out_of_bounds.to_string()).await.outcome,
        IngestOutcome::Rejected(RejectReason::SchemaMismatch)
    );

    let mut missing = payload(1, 2, "Red", "Ada");
    missing.as_object_mut().unwrap().remove("team_number");
    let report = pipeline.ingest(&missing.to_string()).await;
    assert_eq!(report.outcome, IngestOutcome::Rejected(RejectReason::Validation));
    assert!(report.summary.contains("team_number"));

    let stats = store.stats().await.unwrap();
    assert_eq!((stats.match_records, stats.parked_records), (0, 0));
}

#[tokio::test]
async fn test_store_failure_rejects_submission_only() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());

    fail_inserts_into(&store, "observations").await;
    let report = pipeline.ingest(&payload(5, 5, "Red", "Ada").to_string()).await;
    assert_eq!(report.outcome, IngestOutcome::Rejected(RejectReason::Store));
    assert!(report.record.is_some());

    clear_insert_failure(&store, "observations").await;
    let retry = pipeline.ingest(&payload(5, 5, "Red", "Ada").to_string()).await;
    assert_eq!(retry.outcome, IngestOutcome::Accepted);

    fail_inserts_into(&store, "parked_observations").await;
    let conflict = with(payload(5, 5, "Red", "Ada"), "penalties", json!(4));
    let report = pipeline.ingest(&conflict.to_string()).await;
    assert_eq!(report.outcome, IngestOutcome::Rejected(RejectReason::Store));
    assert_eq!(store.stats().await.unwrap().parked_records, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_submissions_accept_once() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());
    let text = payload(42, 4414, "Blue", "Ada").to_string();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = pipeline.clone();
            let text = text.clone();
            tokio::spawn(async move { pipeline.ingest(&text).await.outcome })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| **o == IngestOutcome::Accepted).count(), 1);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, IngestOutcome::Accepted | IngestOutcome::DuplicateIdentical)));

    let stats = store.stats().await.unwrap();
    assert_eq!((stats.match_records, stats.parked_records), (1, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_divergent_submissions_lose_nothing() {
    let (_dir, store) = temp_store().await;
    let pipeline = IngestPipeline::new(store.clone());

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let pipeline = pipeline.clone();
            let text = with(payload(42, 4414, "Blue", "Ada"), "penalties", json!(i)).to_string();
            tokio::spawn(async move { pipeline.ingest(&text).await.outcome })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| **o == IngestOutcome::Accepted).count(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| **o == IngestOutcome::DuplicateConflicting).count(),
        5
    );

    let stats = store.stats().await.unwrap();
    assert_eq!((stats.match_records, stats.parked_records), (1, 5));
}
