//! Per-device analytics: hourly aggregation plus cached daily stats.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::aggregate;
use crate::error::PipelineError;

use super::{ApiError, AppState};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/v1/devices/{device_id}/analytics", get(analytics))
}

#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    /// `YYYY-MM-DD`, defaulting to the current UTC day.
    date: Option<NaiveDate>,
}

/// Handle `GET /api/v1/devices/{device_id}/analytics`.
async fn analytics(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let Some(device) = state.store.device(&device_id) else {
        return Err(PipelineError::not_found("device", &device_id).into());
    };

    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());

    let hourly = aggregate::aggregate_hourly(&state.store, &device_id, date);
    let data_count: usize = hourly.iter().map(|h| h.count).sum();
    let daily_stats = state.stats.get_or_compute(&state.store, &device_id, date);
    let latest_reading = state.store.latest_by_device(&device_id, 1).pop();

    Ok(Json(json!({
        "data": {
            "device": device,
            "date": date,
            "hourly_aggregation": hourly,
            "data_count": data_count,
            "daily_stats": daily_stats,
            "latest_reading": latest_reading,
        }
    })))
}
