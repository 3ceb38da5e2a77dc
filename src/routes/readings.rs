//! Reading ingestion and the per-device time-series queries.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::PipelineError;
use crate::models::RawReading;

use super::{ApiError, AppState};

// ---

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route(
        "/api/v1/devices/{device_id}/readings",
        get(query_readings).post(ingest),
    )
}

// ---

/// Handle `POST /api/v1/devices/{device_id}/readings`.
async fn ingest(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(raw): Json<RawReading>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let reading = state.pipeline.ingest(&device_id, raw).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": reading,
            "message": "Sensor data recorded successfully",
        })),
    ))
}

/// Query parameters for `GET .../readings`.
#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    // ---
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    /// `latest=true` switches from range scan to the latest-N index.
    latest: Option<bool>,
    limit: Option<usize>,
}

/// Handle `GET /api/v1/devices/{device_id}/readings`.
///
/// Range mode (default) returns readings in `[start, end]` ascending, the
/// window defaulting to the last 24 hours; latest mode returns the most
/// recent N descending. `limit` defaults to 100, hard-capped at 1000.
async fn query_readings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<ReadingsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    if state.store.device(&device_id).is_none() {
        return Err(PipelineError::not_found("device", &device_id).into());
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let readings = if params.latest.unwrap_or(false) {
        state.store.latest_by_device(&device_id, limit)
    } else {
        let end = params.end.unwrap_or_else(Utc::now);
        let start = params.start.unwrap_or(end - Duration::days(1));
        let mut readings = state.store.range_query(&device_id, start, end);
        readings.truncate(limit);
        readings
    };

    info!(%device_id, count = readings.len(), "Readings query served");
    Ok(Json(json!({ "data": readings })))
}
