//! frcs-si library: Scouting Ingest service
//!
//! HTTP transport and stdin scan feed over the ingestion pipeline. Both
//! surfaces hand decoded payload text to the same pipeline and report its
//! outcome; neither writes to the store directly.

use axum::Router;
use frcs_common::ingest::IngestPipeline;
use frcs_common::store::RecordStore;
use frcs_common::FieldSchema;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod scan;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestPipeline,
}

impl AppState {
    pub fn new(store: RecordStore) -> Self {
        Self {
            pipeline: IngestPipeline::new(store),
        }
    }

    pub fn store(&self) -> &RecordStore {
        self.pipeline.store()
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        self.pipeline.store().schema()
    }
}

/// Build application router
///
/// The scouting form is served from another origin, so CORS is open.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/submit", post(api::submit))
        .route("/api/stats", get(api::get_stats))
        .route("/api/schema", get(api::get_schema))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
