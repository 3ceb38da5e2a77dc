//! End-to-end pipeline tests over the library API: ingest through the
//! synchronous stage, drain the queue with a real worker pool, and observe
//! the stored readings, alert batches and analytics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};

use sensorgrid::aggregate::{self, DailyStatsCache};
use sensorgrid::alerts::{Alert, AlertType};
use sensorgrid::notify::Notifier;
use sensorgrid::pipeline::IngestionPipeline;
use sensorgrid::queue::{self, RetryPolicy, TaskQueue};
use sensorgrid::store::TimeSeriesStore;
use sensorgrid::{Device, DeviceStatus, GeoPoint, QualityTier, RawReading, Result};

// ---

/// Captures deliveries; optionally fails the first `failures` alert
/// dispatches with a transient error to exercise the retry path.
#[derive(Default)]
struct RecordingNotifier {
    failures: AtomicU32,
    attempts: AtomicU32,
    batches: Mutex<Vec<(String, Vec<Alert>)>>,
    externals: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn failing(failures: u32) -> Self {
        // ---
        Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch_alerts(&self, device_id: &str, alerts: &[Alert]) -> Result<()> {
        // ---
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(sensorgrid::PipelineError::transient("webhook unreachable"));
        }
        self.batches
            .lock()
            .unwrap()
            .push((device_id.to_string(), alerts.to_vec()));
        Ok(())
    }

    async fn notify_external(
        &self,
        device: &Device,
        _reading: &sensorgrid::SensorReading,
    ) -> Result<()> {
        // ---
        self.externals
            .lock()
            .unwrap()
            .push(device.device_id.clone());
        Ok(())
    }
}

struct Harness {
    store: Arc<TimeSeriesStore>,
    stats: Arc<DailyStatsCache>,
    pipeline: Arc<IngestionPipeline>,
    notifier: Arc<RecordingNotifier>,
    receiver: Option<tokio::sync::mpsc::Receiver<queue::ProcessTask>>,
}

fn harness(notifier: RecordingNotifier) -> Harness {
    // ---
    let store = Arc::new(TimeSeriesStore::new());
    let stats = Arc::new(DailyStatsCache::default());
    let notifier = Arc::new(notifier);
    let (queue, receiver) = TaskQueue::bounded(64);

    store.upsert_device(Device {
        device_id: "greenhouse-7".to_string(),
        status: DeviceStatus::Active,
        location: Some(GeoPoint {
            latitude: 35.6812,
            longitude: 139.7671,
        }),
    });

    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&store),
        Arc::clone(&stats),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        queue,
    ));

    Harness {
        store,
        stats,
        pipeline,
        notifier,
        receiver: Some(receiver),
    }
}

/// Poll until `condition` holds, failing the test after two seconds.
async fn wait_for(mut condition: impl FnMut() -> bool) {
    // ---
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn raw_at(ts: chrono::DateTime<Utc>, temperature: f64) -> RawReading {
    // ---
    RawReading {
        timestamp: Some(ts),
        temperature: Some(temperature),
        ..RawReading::default()
    }
}

// ---

#[tokio::test]
async fn worker_pool_processes_ingested_readings() {
    // ---
    let mut h = harness(RecordingNotifier::default());
    let workers = queue::spawn_workers(
        2,
        h.receiver.take().unwrap(),
        Arc::clone(&h.pipeline),
        RetryPolicy::default(),
    );

    // Hot reading on a weak battery: high_temperature alert plus an
    // external notification, tier stays Good (only the battery deduction).
    let raw = RawReading {
        temperature: Some(38.5),
        battery_level: Some(12.0),
        ..RawReading::default()
    };
    let stored = h.pipeline.ingest("greenhouse-7", raw).await.unwrap();
    assert_eq!(stored.quality_tier, QualityTier::Good);

    let notifier = Arc::clone(&h.notifier);
    wait_for(move || !notifier.externals.lock().unwrap().is_empty()).await;

    let batches = h.notifier.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    let (device_id, alerts) = &batches[0];
    assert_eq!(device_id, "greenhouse-7");
    let kinds: Vec<_> = alerts.iter().map(|a| a.alert_type).collect();
    assert_eq!(kinds, vec![AlertType::HighTemperature, AlertType::LowBattery]);

    // The day's stats were refreshed and retained by the worker.
    let date = stored.timestamp.date_naive();
    let cached = h.stats.cached("greenhouse-7", date).expect("stats cached");
    assert_eq!(cached.data_count, 1);

    for worker in workers {
        worker.abort();
    }
}

#[tokio::test]
async fn transient_notifier_failures_are_retried_until_delivery() {
    // ---
    let mut h = harness(RecordingNotifier::failing(2));
    let policy = RetryPolicy {
        max_retries: 3,
        base_backoff: Duration::from_millis(1),
    };
    let workers = queue::spawn_workers(
        1,
        h.receiver.take().unwrap(),
        Arc::clone(&h.pipeline),
        policy,
    );

    let raw = RawReading {
        temperature: Some(2.0),
        ..RawReading::default()
    };
    h.pipeline.ingest("greenhouse-7", raw).await.unwrap();

    let notifier = Arc::clone(&h.notifier);
    wait_for(move || !notifier.batches.lock().unwrap().is_empty()).await;

    // Two transient failures, then success on the third delivery.
    assert_eq!(h.notifier.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(h.notifier.batches.lock().unwrap().len(), 1);

    for worker in workers {
        worker.abort();
    }
}

#[tokio::test]
async fn range_and_latest_queries_cover_a_day_boundary() {
    // ---
    let mut h = harness(RecordingNotifier::default());
    let _receiver = h.receiver.take(); // keep the queue open, drain nothing

    let timestamps = [
        Utc.with_ymd_and_hms(2025, 6, 1, 23, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 1, 23, 45, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 2, 0, 15, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 2, 1, 0, 0).unwrap(),
    ];
    for (i, ts) in timestamps.iter().enumerate() {
        h.pipeline
            .ingest("greenhouse-7", raw_at(*ts, 20.0 + i as f64))
            .await
            .unwrap();
    }

    let window = h.store.range_query(
        "greenhouse-7",
        Utc.with_ymd_and_hms(2025, 6, 1, 23, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 6, 2, 1, 0, 0).unwrap(),
    );
    let got: Vec<_> = window.iter().map(|r| r.timestamp).collect();
    assert_eq!(got, timestamps);

    let latest = h.store.latest_by_device("greenhouse-7", 2);
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].timestamp, timestamps[3]);
    assert_eq!(latest[1].timestamp, timestamps[2]);
}

#[tokio::test]
async fn analytics_reflect_processed_readings() {
    // ---
    let mut h = harness(RecordingNotifier::default());
    let mut receiver = h.receiver.take().unwrap();

    // Three readings in hour 4, none in hour 3.
    for (minute, temp) in [(0, 10.0), (20, 20.0), (40, 30.0)] {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 4, minute, 0).unwrap();
        h.pipeline
            .ingest("greenhouse-7", raw_at(ts, temp))
            .await
            .unwrap();
    }

    // Drain the queue inline instead of spawning workers.
    for _ in 0..3 {
        let task = receiver.recv().await.unwrap();
        h.pipeline.process(&task).await.unwrap();
    }

    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let hourly = aggregate::aggregate_hourly(&h.store, "greenhouse-7", date);
    assert_eq!(hourly.len(), 1);
    assert_eq!(hourly[0].hour, 4);
    assert_eq!(hourly[0].count, 3);
    assert_eq!(hourly[0].avg_temperature, Some(20.0));

    let stats = h.stats.cached("greenhouse-7", date).expect("stats cached");
    assert_eq!(stats.data_count, 3);
    let temperature = stats.temperature.unwrap();
    assert_eq!((temperature.min, temperature.max), (10.0, 30.0));
}

#[tokio::test]
async fn unknown_reading_task_is_not_retried() {
    // ---
    let mut h = harness(RecordingNotifier::default());
    let _receiver = h.receiver.take();

    let task = queue::ProcessTask::new("greenhouse-7", uuid::Uuid::new_v4());
    let err = h.pipeline.process(&task).await.unwrap_err();

    assert!(matches!(err, sensorgrid::PipelineError::NotFound { .. }));
    assert!(!err.is_retryable());
    assert!(h.notifier.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn radius_query_finds_nearby_devices_only() {
    // ---
    let h = harness(RecordingNotifier::default());

    h.store.upsert_device(Device {
        device_id: "rooftop-2".to_string(),
        status: DeviceStatus::Active,
        location: Some(GeoPoint {
            latitude: 35.6812,
            longitude: 139.7671,
        }),
    });
    // Roughly 200 km away.
    h.store.upsert_device(Device {
        device_id: "faraway-1".to_string(),
        status: DeviceStatus::Active,
        location: Some(GeoPoint {
            latitude: 35.6812,
            longitude: 137.55,
        }),
    });

    let nearby = h.store.radius_query(35.6812, 139.7671, 0.01);
    let ids: Vec<_> = nearby.iter().map(|d| d.device_id.as_str()).collect();
    assert_eq!(ids, vec!["greenhouse-7", "rooftop-2"]);

    let within_one_km = h.store.radius_query(35.6812, 139.7671, 1.0);
    assert!(!within_one_km.iter().any(|d| d.device_id == "faraway-1"));
}
