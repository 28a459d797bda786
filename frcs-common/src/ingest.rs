//! Ingestion pipeline
//!
//! Turns one decoded payload into at most one store write and reports which
//! of four outcomes occurred. Holds no state between submissions; the store's
//! uniqueness constraint is the only serialization point between concurrent
//! callers.

use crate::codec::{self, DecodeError};
use crate::record::{FieldMap, ObservationRecord};
use crate::store::{CommitOutcome, RecordStore, RowTable};
use crate::{time, Error, Result};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Why a submission was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Not a scouting payload at all
    Malformed,
    /// Unknown key, or a value outside its type/bounds/options
    SchemaMismatch,
    /// Required field missing or record-level check failed
    Validation,
    /// The store could not complete the write
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Accepted,
    /// Same content already stored; nothing written
    DuplicateIdentical,
    /// Key already stored with different content; parked for reconciliation
    DuplicateConflicting,
    Rejected(RejectReason),
}

impl IngestOutcome {
    /// Wire name used by the HTTP transport
    pub fn status(&self) -> &'static str {
        match self {
            IngestOutcome::Accepted => "accepted",
            IngestOutcome::DuplicateIdentical => "duplicate_identical",
            IngestOutcome::DuplicateConflicting => "duplicate_conflicting",
            IngestOutcome::Rejected(_) => "rejected",
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status())
    }
}

/// What the caller gets back for one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub outcome: IngestOutcome,
    /// The validated record, when the payload got that far
    pub record: Option<ObservationRecord>,
    /// `Match {n}, Team {t}` or the rejection detail
    pub summary: String,
}

impl IngestReport {
    fn rejected(reason: RejectReason, record: Option<ObservationRecord>, summary: String) -> Self {
        Self {
            outcome: IngestOutcome::Rejected(reason),
            record,
            summary,
        }
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    store: RecordStore,
}

impl IngestPipeline {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Ingest one decoded payload text
    pub async fn ingest(&self, text: &str) -> IngestReport {
        match codec::decode(self.store.schema(), text) {
            Ok(fields) => self.ingest_fields(fields).await,
            Err(e) => {
                let reason = match e {
                    DecodeError::MalformedPayload(_) => RejectReason::Malformed,
                    DecodeError::SchemaMismatch { .. } => RejectReason::SchemaMismatch,
                };
                warn!("Rejected payload: {}", e);
                IngestReport::rejected(reason, None, e.to_string())
            }
        }
    }

    /// Ingest an already-decoded field map
    pub async fn ingest_fields(&self, fields: FieldMap) -> IngestReport {
        let record = match ObservationRecord::from_fields(self.store.schema(), fields, time::now()) {
            Ok(record) => record,
            Err(e) => {
                warn!("Rejected payload: {}", e);
                return IngestReport::rejected(
                    RejectReason::Validation,
                    None,
                    format!("Validation failed: {}", e),
                );
            }
        };

        match self.classify_and_store(&record).await {
            Ok(outcome) => IngestReport {
                outcome,
                summary: record.summary(),
                record: Some(record),
            },
            Err(e) => {
                warn!("Store error while ingesting {}: {}", record.key, e);
                IngestReport::rejected(RejectReason::Store, Some(record), e.to_string())
            }
        }
    }

    async fn classify_and_store(&self, record: &ObservationRecord) -> Result<IngestOutcome> {
        let fingerprint = record.fingerprint();

        // A lost commit race is re-classified once against the winner
        for _ in 0..2 {
            let existing = self.store.rows_for_key(&record.key).await?;

            if existing.iter().any(|row| row.record.fingerprint() == fingerprint) {
                debug!("{} already recorded with identical content", record.key);
                return Ok(IngestOutcome::DuplicateIdentical);
            }

            let has_canonical = existing.iter().any(|row| row.row.table == RowTable::Canonical);
            if !has_canonical {
                match self.store.commit(record).await? {
                    CommitOutcome::Accepted(row) => {
                        info!("Accepted {} from {} ({})", record.key, record.scouter_name, row);
                        return Ok(IngestOutcome::Accepted);
                    }
                    CommitOutcome::RejectedDuplicateKey => {
                        debug!("Lost commit race for {}, re-classifying", record.key);
                        continue;
                    }
                }
            }

            let row = self.store.park(record).await?;
            warn!(
                "Conflicting duplicate for {} from {} parked as {} ({} rows now share this key)",
                record.key,
                record.scouter_name,
                row,
                existing.len() + 1
            );
            return Ok(IngestOutcome::DuplicateConflicting);
        }

        Err(Error::Internal(format!(
            "Canonical row for {} kept changing during ingestion",
            record.key
        )))
    }
}
