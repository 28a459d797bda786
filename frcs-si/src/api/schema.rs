//! Active field schema

use axum::{extract::State, Json};
use frcs_common::FieldSchema;

use crate::AppState;

/// GET /api/schema
///
/// The schema the server validates against, so the form can render the same
/// fields.
pub async fn get_schema(State(state): State<AppState>) -> Json<FieldSchema> {
    Json(state.schema().as_ref().clone())
}
