//! Conflict resolution engine
//!
//! Collapses each conflict group into one surviving record. Merging is a pure
//! function of the group's records in stored order, so the same policy on the
//! same group always yields the same survivor; only `resolve` touches the
//! store, through its atomic `replace`.

use crate::record::{FieldValue, ObservationRecord};
use crate::schema::{ids, FieldSchema, FieldType};
use crate::store::{ConflictGroup, RecordStore};
use crate::time::parse_timestamp;
use futures::Stream;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{info, warn};

/// Separator between scouter names in a merged record
pub const SCOUTER_SEPARATOR: char = '/';

/// How to collapse a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Keep the record at this position (0-based, stored order) verbatim
    KeepIndex(usize),
    /// Field-wise merge: mean for counters, majority for booleans, most
    /// frequent value for choices and text
    Average,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Nothing to resolve: group has {0} record(s)")]
    EmptyGroup(usize),

    #[error("Record {index} does not exist in a group of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(
        "Another reconciliation pass is running (held by {holder} since {since}); \
         if that pass crashed, clear the lock with `frcs-cr --force-unlock`"
    )]
    Busy { holder: String, since: String },

    #[error(transparent)]
    Store(#[from] crate::Error),
}

/// One disagreeing field and its distinct values in first-appearance order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: String,
    pub values: Vec<FieldValue>,
}

/// Fields whose values differ across the group, in schema order
pub fn diff(schema: &FieldSchema, group: &ConflictGroup) -> Vec<FieldDiff> {
    let maps: Vec<_> = group.records().map(|r| r.to_field_map()).collect();

    schema
        .fields
        .iter()
        .filter_map(|field| {
            let mut values: Vec<FieldValue> = Vec::new();
            for value in maps.iter().filter_map(|m| m.get(&field.id)) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
            (values.len() > 1).then(|| FieldDiff {
                field: field.id.clone(),
                values,
            })
        })
        .collect()
}

/// Compute the survivor for `records` under `policy`
///
/// Accepts a single record so merges can be re-applied to a survivor; for
/// `Average` that is a no-op.
pub fn merge(
    schema: &FieldSchema,
    records: &[ObservationRecord],
    policy: ResolutionPolicy,
) -> Result<ObservationRecord, ResolveError> {
    let first = records.first().ok_or(ResolveError::EmptyGroup(0))?;

    match policy {
        ResolutionPolicy::KeepIndex(index) => {
            records
                .get(index)
                .cloned()
                .ok_or(ResolveError::IndexOutOfRange {
                    index,
                    len: records.len(),
                })
        }
        ResolutionPolicy::Average => {
            let mut survivor = first.clone();

            for field in schema.attribute_fields() {
                let values: Vec<&FieldValue> =
                    records.iter().filter_map(|r| r.attributes.get(&field.id)).collect();
                if values.is_empty() {
                    continue;
                }

                let merged = match &field.field_type {
                    FieldType::Counter { min, max } => {
                        let ints: Vec<i64> = values.iter().filter_map(|v| v.as_i64()).collect();
                        FieldValue::Integer(mean_half_up(&ints).clamp(*min, *max))
                    }
                    FieldType::Boolean => {
                        let trues = values.iter().filter(|v| v.as_bool() == Some(true)).count();
                        FieldValue::Boolean(2 * trues >= values.len())
                    }
                    FieldType::Choice { .. } | FieldType::Text { .. } | FieldType::Timestamp => {
                        most_frequent(&values).clone()
                    }
                };
                survivor.attributes.insert(field.id.clone(), merged);
            }

            survivor.scouter_name = merge_scouter_names(records, scouter_name_limit(schema));
            survivor.submitted_at = records
                .iter()
                .map(|r| r.submitted_at.as_str())
                .min_by(|a, b| compare_timestamps(a, b))
                .unwrap_or(first.submitted_at.as_str())
                .to_string();
            survivor.ingested_at = records
                .iter()
                .map(|r| r.ingested_at)
                .max()
                .unwrap_or(first.ingested_at);

            Ok(survivor)
        }
    }
}

/// Arithmetic mean rounded to nearest, ties up
fn mean_half_up(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let n = values.len() as i64;
    let sum: i64 = values.iter().sum();
    // floor((sum / n) + 1/2)
    (2 * sum + n).div_euclid(2 * n)
}

/// Most frequent value; ties go to whichever appeared first
fn most_frequent<'a>(values: &[&'a FieldValue]) -> &'a FieldValue {
    let mut best = values[0];
    let mut best_count = 0;
    for (i, candidate) in values.iter().enumerate() {
        if values[..i].contains(candidate) {
            continue;
        }
        let count = values.iter().filter(|v| *v == candidate).count();
        if count > best_count {
            best = *candidate;
            best_count = count;
        }
    }
    best
}

/// Distinct contributing names in first-appearance order, joined with `/`
///
/// Already-merged names are split first, so merging a survivor again does not
/// grow the list. Names that would push the result past `max_len` are left
/// out, so the survivor still passes its own field check.
fn merge_scouter_names(records: &[ObservationRecord], max_len: Option<usize>) -> String {
    let mut names: Vec<&str> = Vec::new();
    let mut dropped: Vec<&str> = Vec::new();
    let mut len = 0;
    for name in records
        .iter()
        .flat_map(|r| r.scouter_name.split(SCOUTER_SEPARATOR))
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        if names.contains(&name) || dropped.contains(&name) {
            continue;
        }
        let added = name.chars().count() + usize::from(!names.is_empty());
        if max_len.is_some_and(|limit| len + added > limit) {
            dropped.push(name);
            continue;
        }
        len += added;
        names.push(name);
    }

    if !dropped.is_empty() {
        warn!(
            "Merged scouter names would exceed the field limit; left out {}",
            dropped.join(", ")
        );
    }
    names.join(&SCOUTER_SEPARATOR.to_string())
}

fn scouter_name_limit(schema: &FieldSchema) -> Option<usize> {
    match schema.field(ids::SCOUTER_NAME)?.field_type {
        FieldType::Text { max_len } => max_len,
        _ => None,
    }
}

fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Operator-facing reconciliation over a record store
pub struct ConflictResolver {
    store: RecordStore,
    holder: String,
}

impl ConflictResolver {
    pub fn new(store: RecordStore) -> Self {
        let holder = format!("frcs-cr pid {}", std::process::id());
        Self { store, holder }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Current conflict groups, read fresh from the store
    pub fn list_conflicts(&self) -> impl Stream<Item = crate::Result<ConflictGroup>> + '_ {
        self.store.all_grouped_by_key()
    }

    pub fn diff(&self, group: &ConflictGroup) -> Vec<FieldDiff> {
        diff(self.store.schema(), group)
    }

    /// Survivor `resolve` would install, without writing anything
    pub fn preview(
        &self,
        group: &ConflictGroup,
        policy: ResolutionPolicy,
    ) -> Result<ObservationRecord, ResolveError> {
        if group.len() < 2 {
            return Err(ResolveError::EmptyGroup(group.len()));
        }
        let records: Vec<ObservationRecord> = group.records().cloned().collect();
        merge(self.store.schema(), &records, policy)
    }

    /// Merge the group and atomically replace its rows with the survivor
    pub async fn resolve(
        &self,
        group: &ConflictGroup,
        policy: ResolutionPolicy,
    ) -> Result<ObservationRecord, ResolveError> {
        let survivor = self.preview(group, policy)?;

        match self.store.replace(group, &survivor).await {
            Ok(row) => {
                info!("Resolved {} with {:?} into {}", group.key, policy, row);
                Ok(survivor)
            }
            Err(e) => {
                warn!("Failed to resolve {}: {}", group.key, e);
                Err(e.into())
            }
        }
    }

    /// Start a reconciliation pass; fails with `Busy` if one is running
    pub async fn begin_pass(&self) -> Result<(), ResolveError> {
        if self.store.try_acquire_maintenance_lock(&self.holder).await? {
            info!("Reconciliation lock acquired by {}", self.holder);
            return Ok(());
        }

        let (holder, since) = self
            .store
            .maintenance_lock_holder()
            .await?
            .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
        Err(ResolveError::Busy { holder, since })
    }

    pub async fn end_pass(&self) -> Result<(), ResolveError> {
        self.store.release_maintenance_lock(&self.holder).await?;
        Ok(())
    }
}
