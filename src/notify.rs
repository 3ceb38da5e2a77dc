//! Outbound notification seam.
//!
//! The pipeline talks to an external notification collaborator through the
//! [`Notifier`] trait so the worker stage can be exercised in tests without
//! network access. The production implementation posts JSON to a configured
//! webhook; without one, notifications are only logged.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::alerts::Alert;
use crate::error::{PipelineError, Result};
use crate::models::{Device, SensorReading};

// ---

/// Destination for alert batches and external notifications.
///
/// Failures are transient from the pipeline's perspective: the task queue
/// retries them, so an implementation may be called more than once for the
/// same reading and must tolerate that.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one batch of alerts for a device.
    async fn dispatch_alerts(&self, device_id: &str, alerts: &[Alert]) -> Result<()>;

    /// Push a reading that crossed the external-notification predicate.
    async fn notify_external(&self, device: &Device, reading: &SensorReading) -> Result<()>;
}

// ---

/// Posts notifications to an HTTP webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    // ---
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn post(&self, path: &str, payload: &serde_json::Value) -> Result<()> {
        // ---
        let url = format!("{}/{path}", self.endpoint.trim_end_matches('/'));
        self.client
            .post(&url)
            .json(payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| PipelineError::transient(format!("webhook delivery failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn dispatch_alerts(&self, device_id: &str, alerts: &[Alert]) -> Result<()> {
        // ---
        info!(device_id, count = alerts.len(), "Dispatching alert batch");
        self.post("alerts", &json!({ "device_id": device_id, "alerts": alerts }))
            .await
    }

    async fn notify_external(&self, device: &Device, reading: &SensorReading) -> Result<()> {
        // ---
        info!(device_id = %device.device_id, "Notifying external systems");
        self.post(
            "notifications",
            &json!({
                "device_id": device.device_id,
                "reading_id": reading.reading_id,
                "timestamp": reading.timestamp,
                "quality_tier": reading.quality_tier,
            }),
        )
        .await
    }
}

// ---

/// Fallback when no webhook is configured: records the would-be deliveries
/// in the service log and always succeeds.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch_alerts(&self, device_id: &str, alerts: &[Alert]) -> Result<()> {
        // ---
        for alert in alerts {
            warn!(
                device_id,
                alert_type = ?alert.alert_type,
                severity = ?alert.severity,
                "{}",
                alert.message
            );
        }
        Ok(())
    }

    async fn notify_external(&self, device: &Device, reading: &SensorReading) -> Result<()> {
        // ---
        info!(
            device_id = %device.device_id,
            reading_id = %reading.reading_id,
            quality_tier = ?reading.quality_tier,
            "External notification suppressed (no webhook configured)"
        );
        Ok(())
    }
}
