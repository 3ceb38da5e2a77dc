//! Device registry surface: the pipeline-visible fields plus the radius
//! query. Fleet metadata management (naming, firmware, tags) belongs to a
//! separate service; only id, status and location live here.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::PipelineError;
use crate::models::{Device, DeviceStatus, GeoPoint};

use super::{ApiError, AppState};

// ---

const DEFAULT_RADIUS_KM: f64 = 1.0;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/v1/devices", get(list_devices))
        .route(
            "/api/v1/devices/{device_id}",
            get(show_device).put(upsert_device),
        )
}

// ---

#[derive(Debug, Deserialize)]
struct DevicesQuery {
    // ---
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// Search radius in kilometers; only meaningful with coordinates.
    radius: Option<f64>,
    status: Option<DeviceStatus>,
}

/// Handle `GET /api/v1/devices`.
///
/// With coordinates this is a radius query (default 1.0 km); otherwise it
/// lists registered devices, optionally filtered by status.
async fn list_devices(
    State(state): State<AppState>,
    Query(params): Query<DevicesQuery>,
) -> impl IntoResponse {
    // ---
    let devices = match (params.latitude, params.longitude) {
        (Some(latitude), Some(longitude)) => {
            let radius_km = params.radius.unwrap_or(DEFAULT_RADIUS_KM);
            state.store.radius_query(latitude, longitude, radius_km)
        }
        _ => {
            let mut devices = state.store.devices();
            if let Some(status) = params.status {
                devices.retain(|d| d.status == status);
            }
            devices
        }
    };

    Json(json!({ "data": devices }))
}

/// Handle `GET /api/v1/devices/{device_id}`.
async fn show_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    let device = state
        .store
        .device(&device_id)
        .ok_or_else(|| PipelineError::not_found("device", &device_id))?;

    Ok(Json(json!({ "data": device })))
}

#[derive(Debug, Deserialize)]
struct DeviceUpsert {
    // ---
    status: Option<DeviceStatus>,
    location: Option<GeoPoint>,
}

/// Handle `PUT /api/v1/devices/{device_id}`.
///
/// Registers the device or replaces the provided fields; omitted fields
/// keep their current value (a fresh registration defaults to `active`).
async fn upsert_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(body): Json<DeviceUpsert>,
) -> impl IntoResponse {
    // ---
    let existing = state.store.device(&device_id);

    let device = Device {
        device_id: device_id.clone(),
        status: body
            .status
            .or(existing.as_ref().map(|d| d.status))
            .unwrap_or(DeviceStatus::Active),
        location: body.location.or(existing.and_then(|d| d.location)),
    };

    state.store.upsert_device(device.clone());
    info!(%device_id, status = ?device.status, "Device registered");

    Json(json!({
        "data": device,
        "message": "Device registered successfully",
    }))
}
