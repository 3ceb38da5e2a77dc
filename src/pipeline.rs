//! The ingestion pipeline: synchronous request stage and asynchronous
//! worker stage.
//!
//! Synchronous (on the request path): validate → score initial tier →
//! persist → enqueue. Asynchronous (worker pool): reload → re-score
//! (idempotent) → evaluate alerts → refresh daily stats → conditionally
//! notify external systems. The two stages share no state beyond the store,
//! the stats cache and the queue, all passed in at construction so tests can
//! substitute any of them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::aggregate::DailyStatsCache;
use crate::alerts;
use crate::error::{PipelineError, Result};
use crate::models::{QualityTier, RawReading, SensorReading};
use crate::notify::Notifier;
use crate::quality;
use crate::queue::{ProcessTask, TaskQueue};
use crate::store::TimeSeriesStore;

// ---

pub struct IngestionPipeline {
    store: Arc<TimeSeriesStore>,
    stats: Arc<DailyStatsCache>,
    notifier: Arc<dyn Notifier>,
    queue: TaskQueue,
}

impl IngestionPipeline {
    // ---
    pub fn new(
        store: Arc<TimeSeriesStore>,
        stats: Arc<DailyStatsCache>,
        notifier: Arc<dyn Notifier>,
        queue: TaskQueue,
    ) -> Self {
        Self {
            store,
            stats,
            notifier,
            queue,
        }
    }

    /// Synchronous stage. Returns the persisted reading with its computed
    /// initial quality tier, or a validation error with per-field detail.
    ///
    /// The reading is durable once this returns; the asynchronous stage only
    /// adds post-processing on top and never rolls it back.
    pub async fn ingest(&self, device_id: &str, raw: RawReading) -> Result<SensorReading> {
        // ---
        if self.store.device(device_id).is_none() {
            return Err(PipelineError::not_found("device", device_id));
        }

        let mut reading = SensorReading::from_raw(device_id, raw, Utc::now());
        reading.quality_tier = quality::assess(&reading);

        let stored = self.store.insert(reading)?;

        // New data makes any cached stats for that day stale.
        self.stats
            .invalidate(device_id, stored.timestamp.date_naive());

        self.queue
            .enqueue(ProcessTask::new(device_id, stored.reading_id))
            .await?;

        info!(
            device_id,
            reading_id = %stored.reading_id,
            quality_tier = ?stored.quality_tier,
            "Reading ingested and queued for processing"
        );
        Ok(stored)
    }

    /// Asynchronous stage, one attempt. The worker pool handles retry
    /// classification; everything here is safe to repeat.
    pub async fn process(&self, task: &ProcessTask) -> Result<()> {
        // ---
        debug!(
            device_id = %task.device_id,
            reading_id = %task.reading_id,
            attempt = task.attempt,
            "Processing sensor data"
        );

        let mut reading = self
            .store
            .reading(task.reading_id)
            .ok_or_else(|| PipelineError::not_found("reading", task.reading_id))?;
        let device = self
            .store
            .device(&task.device_id)
            .ok_or_else(|| PipelineError::not_found("device", &task.device_id))?;

        // Re-score; the same input always maps to the same tier, so a
        // retried or reordered task converges on the same stored state.
        let tier = quality::assess(&reading);
        if tier == QualityTier::Poor {
            warn!(
                device_id = %task.device_id,
                reading_id = %task.reading_id,
                "Poor data quality detected"
            );
        }
        if tier != reading.quality_tier {
            reading.quality_tier = tier;
        }
        self.store.insert(reading.clone())?;

        let triggered = alerts::evaluate(&reading);
        if !triggered.is_empty() {
            self.notifier
                .dispatch_alerts(&task.device_id, &triggered)
                .await?;
        }

        self.stats
            .refresh(&self.store, &task.device_id, reading.timestamp.date_naive());

        if alerts::should_notify_externally(&reading) {
            self.notifier.notify_external(&device, &reading).await?;
        }

        info!(
            device_id = %task.device_id,
            reading_id = %task.reading_id,
            "Sensor data processing completed"
        );
        Ok(())
    }
}
