//! Data models for the telemetry pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ValidationErrors};

// ---

/// Operational status of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Maintenance,
    Error,
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// The device fields the pipeline reads. Registry metadata beyond these
/// (model, firmware, tags, ...) lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    // ---
    pub device_id: String,
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// Categorical label summarizing a numeric quality score.
///
/// `Excellent` is part of the wire vocabulary but the scoring map never
/// produces it; no boundary for it has been defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

// ---

/// Reading payload as submitted by a device or gateway.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawReading {
    // ---
    pub timestamp: Option<DateTime<Utc>>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub co2_level: Option<f64>,
    pub light_intensity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub ph_level: Option<f64>,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    pub location: Option<GeoPoint>,
    pub raw_data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A persisted sensor reading.
///
/// Identity within a partition is `(device_id, timestamp truncated to the
/// second)`; a second write with the same pair overwrites the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    // ---
    pub reading_id: Uuid,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub co2_level: Option<f64>,
    pub light_intensity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub ph_level: Option<f64>,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    pub location: Option<GeoPoint>,
    pub quality_tier: QualityTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl SensorReading {
    // ---

    /// Build a reading from a raw submission. A missing timestamp defaults
    /// to the arrival instant; the quality tier starts at `Good` and is
    /// replaced by the scorer before the reading is persisted.
    pub fn from_raw(device_id: &str, raw: RawReading, arrival: DateTime<Utc>) -> Self {
        // ---
        Self {
            reading_id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            timestamp: raw.timestamp.unwrap_or(arrival),
            temperature: raw.temperature,
            humidity: raw.humidity,
            pressure: raw.pressure,
            co2_level: raw.co2_level,
            light_intensity: raw.light_intensity,
            soil_moisture: raw.soil_moisture,
            ph_level: raw.ph_level,
            battery_level: raw.battery_level,
            signal_strength: raw.signal_strength,
            location: raw.location,
            quality_tier: QualityTier::Good,
            raw_data: raw.raw_data,
        }
    }

    /// The seven metric fields, named, in declaration order.
    pub fn metric_values(&self) -> [(&'static str, Option<f64>); 7] {
        // ---
        [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("pressure", self.pressure),
            ("co2_level", self.co2_level),
            ("light_intensity", self.light_intensity),
            ("soil_moisture", self.soil_moisture),
            ("ph_level", self.ph_level),
        ]
    }

    pub fn has_any_metric(&self) -> bool {
        self.metric_values().iter().any(|(_, v)| v.is_some())
    }

    /// Check the data-model invariants, collecting every violation.
    ///
    /// Note the validation bands are wider than the quality-scoring bands: a
    /// temperature of 80 is accepted here but costs 30 quality points.
    pub fn validate(&self) -> Result<()> {
        // ---
        let mut errors = ValidationErrors::new();

        if self.device_id.is_empty() {
            errors.push("device_id", "can't be blank");
        }

        if !self.has_any_metric() {
            errors.push("base", "At least one sensor value must be present");
        }

        if let Some(t) = self.temperature {
            if !(-50.0..=100.0).contains(&t) {
                errors.push("temperature", "must be between -50 and 100 degrees Celsius");
            }
        }

        if let Some(h) = self.humidity {
            if !(0.0..=100.0).contains(&h) {
                errors.push("humidity", "must be between 0 and 100 percent");
            }
        }

        if let Some(b) = self.battery_level {
            if !(0.0..=100.0).contains(&b) {
                errors.push("battery_level", "must be between 0 and 100 percent");
            }
        }

        errors.into_result()
    }
}
