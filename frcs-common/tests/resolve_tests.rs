//! Conflict resolution against a live store

mod helpers;

use frcs_common::ingest::IngestPipeline;
use frcs_common::resolve::{ConflictResolver, ResolutionPolicy, ResolveError};
use frcs_common::store::{ConflictGroup, RecordStore};
use frcs_common::FieldValue;
use futures::TryStreamExt;
use helpers::*;
use serde_json::{json, Value};

async fn seed(store: &RecordStore, payloads: &[Value]) {
    let pipeline = IngestPipeline::new(store.clone());
    for p in payloads {
        pipeline.ingest(&p.to_string()).await;
    }
}

async fn groups(resolver: &ConflictResolver) -> Vec<ConflictGroup> {
    resolver.list_conflicts().try_collect().await.unwrap()
}

#[tokio::test]
async fn test_keep_index_discards_the_others() {
    let (_dir, store) = temp_store().await;
    let a = payload(12, 254, "Red", "Ada");
    let b = with(payload(12, 254, "Red", "Grace"), "auto_balls_scored_upper", json!(6));
    seed(&store, &[a.clone(), b.clone()]).await;

    let resolver = ConflictResolver::new(store.clone());
    let group = groups(&resolver).await.remove(0);
    let survivor = resolver.resolve(&group, ResolutionPolicy::KeepIndex(1)).await.unwrap();

    assert_eq!(survivor, group.members[1].record);
    let rows = store.rows_for_key(&group.key).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record, survivor);
    assert_ne!(rows[0].record.fingerprint(), record(&a).fingerprint());
    assert!(groups(&resolver).await.is_empty());
}

#[tokio::test]
async fn test_average_over_stored_group() {
    let (_dir, store) = temp_store().await;
    let base = payload(20, 1323, "Blue", "Ada");
    seed(
        &store,
        &[
            with(base.clone(), "auto_balls_scored_upper", json!(2)),
            with(with(base.clone(), "auto_balls_scored_upper", json!(3)), "scouter_name", json!("Grace")),
            with(with(base.clone(), "auto_balls_scored_upper", json!(4)), "auto_taxi", json!(false)),
        ],
    )
    .await;

    let resolver = ConflictResolver::new(store.clone());
    let group = groups(&resolver).await.remove(0);
    assert_eq!(group.len(), 3);

    let survivor = resolver.resolve(&group, ResolutionPolicy::Average).await.unwrap();
    assert_eq!(survivor.attributes["auto_balls_scored_upper"], FieldValue::Integer(3));
    assert_eq!(survivor.attributes["auto_taxi"], FieldValue::Boolean(true));
    assert_eq!(survivor.scouter_name, "Ada/Grace");

    let stored = store.find_by_key(&group.key).await.unwrap().unwrap();
    assert_eq!(stored.record, survivor);
    assert_eq!(store.stats().await.unwrap().parked_records, 0);
}

#[tokio::test]
async fn test_diff_lists_only_disagreeing_fields() {
    let (_dir, store) = temp_store().await;
    let base = payload(20, 1323, "Blue", "Ada");
    seed(
        &store,
        &[
            base.clone(),
            with(with(base.clone(), "climb_level", json!("High")), "scouter_name", json!("Grace")),
        ],
    )
    .await;

    let resolver = ConflictResolver::new(store);
    let group = groups(&resolver).await.remove(0);
    let diff = resolver.diff(&group);
    let fields: Vec<&str> = diff.iter().map(|d| d.field.as_str()).collect();
    assert_eq!(fields, ["scouter_name", "climb_level"]);
    assert_eq!(
        diff[1].values,
        [FieldValue::Text("Mid".into()), FieldValue::Text("High".into())]
    );
}

#[tokio::test]
async fn test_resolve_needs_two_records() {
    let (_dir, store) = temp_store().await;
    let a = payload(1, 1, "Red", "Ada");
    seed(&store, &[a.clone()]).await;

    let resolver = ConflictResolver::new(store.clone());
    let key = record(&a).key;
    let group = ConflictGroup {
        key,
        members: store.rows_for_key(&key).await.unwrap(),
    };

    assert!(matches!(
        resolver.resolve(&group, ResolutionPolicy::Average).await,
        Err(ResolveError::EmptyGroup(1))
    ));
    assert_eq!(store.rows_for_key(&key).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_replace_leaves_group_intact() {
    let (_dir, store) = temp_store().await;
    let base = payload(3, 3, "Red", "Ada");
    seed(&store, &[base.clone(), with(base.clone(), "penalties", json!(3))]).await;

    let resolver = ConflictResolver::new(store.clone());
    let group = groups(&resolver).await.remove(0);

    fail_inserts_into(&store, "observations").await;
    let err = resolver.resolve(&group, ResolutionPolicy::Average).await.unwrap_err();
    assert!(matches!(err, ResolveError::Store(_)));

    let after = groups(&resolver).await;
    assert_eq!(after, vec![group]);
}

#[tokio::test]
async fn test_second_pass_is_busy() {
    let (_dir, store) = temp_store().await;
    let first = ConflictResolver::new(store.clone());
    let second = ConflictResolver::new(store.clone());

    first.begin_pass().await.unwrap();
    assert!(matches!(second.begin_pass().await, Err(ResolveError::Busy { .. })));

    first.end_pass().await.unwrap();
    second.begin_pass().await.unwrap();
    second.end_pass().await.unwrap();
}
