//! Store statistics

use axum::{extract::State, Json};
use frcs_common::store::StoreStats;

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StoreStats>> {
    Ok(Json(state.store().stats().await?))
}
