//! Payload submission

use axum::{extract::State, http::StatusCode, Json};
use frcs_common::ingest::{IngestOutcome, IngestReport, RejectReason};
use frcs_common::ObservationRecord;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// `accepted`, `duplicate_identical`, `duplicate_conflicting` or `rejected`
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ObservationRecord>,
}

/// HTTP status for an ingestion outcome
pub fn status_code(outcome: &IngestOutcome) -> StatusCode {
    match outcome {
        IngestOutcome::Accepted => StatusCode::CREATED,
        IngestOutcome::DuplicateIdentical => StatusCode::OK,
        IngestOutcome::DuplicateConflicting => StatusCode::ACCEPTED,
        IngestOutcome::Rejected(RejectReason::Store) => StatusCode::INTERNAL_SERVER_ERROR,
        IngestOutcome::Rejected(_) => StatusCode::BAD_REQUEST,
    }
}

fn message(report: &IngestReport) -> String {
    match report.outcome {
        IngestOutcome::Accepted => format!("Saved: {}", report.summary),
        IngestOutcome::DuplicateIdentical => format!("Already recorded: {}", report.summary),
        IngestOutcome::DuplicateConflicting => {
            format!("Conflicting duplicate parked for review: {}", report.summary)
        }
        IngestOutcome::Rejected(_) => report.summary.clone(),
    }
}

/// POST /api/submit
///
/// Body is the decoded payload text, exactly as carried in the QR symbol.
pub async fn submit(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    if body.trim().is_empty() {
        return Err(ApiError::BadRequest("Empty payload".to_string()));
    }

    let report = state.pipeline.ingest(&body).await;
    let reason = match report.outcome {
        IngestOutcome::Rejected(reason) => Some(reason),
        _ => None,
    };

    Ok((
        status_code(&report.outcome),
        Json(SubmitResponse {
            status: report.outcome.status(),
            message: message(&report),
            reason,
            record: report.record,
        }),
    ))
}
