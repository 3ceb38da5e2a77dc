//! HTTP boundary for the telemetry pipeline.
//!
//! Gateway module (EMBP): each sibling file owns its endpoints and exports a
//! subrouter; this module merges them and wires in the shared state, so the
//! binary never learns about individual endpoints.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use crate::aggregate::DailyStatsCache;
use crate::error::PipelineError;
use crate::pipeline::IngestionPipeline;
use crate::store::TimeSeriesStore;

mod analytics;
mod devices;
mod health;
mod readings;

// ---

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TimeSeriesStore>,
    pub stats: Arc<DailyStatsCache>,
    pub pipeline: Arc<IngestionPipeline>,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(readings::router())
        .merge(analytics::router())
        .merge(devices::router())
        .merge(health::router())
        .with_state(state)
}

// ---

/// Adapter mapping the pipeline error taxonomy onto HTTP responses.
///
/// Validation carries its per-field details into the body; transient
/// failures surface as 503 so clients know to retry.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        match self.0 {
            PipelineError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "Validation failed",
                    "details": errors.errors(),
                })),
            )
                .into_response(),
            err @ PipelineError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": "Resource not found",
                    "message": err.to_string(),
                })),
            )
                .into_response(),
            err @ PipelineError::Transient { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Service temporarily unavailable",
                    "message": err.to_string(),
                })),
            )
                .into_response(),
        }
    }
}
