//! Hourly aggregation and the per-day stats cache.
//!
//! Both computations are pure functions of the stored readings, so two tasks
//! recomputing the same device/date concurrently land on the same value and
//! last-writer-wins needs no coordination. Aggregation never fails: absent
//! metrics are excluded from their average instead of polluting it.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

use crate::models::SensorReading;
use crate::store::TimeSeriesStore;

/// Default cache retention: one hour past midnight, so yesterday's stats
/// stay answerable while today's first readings arrive.
pub const DEFAULT_STATS_TTL: Duration = Duration::from_secs(25 * 60 * 60);

// ---

/// The UTC day `[00:00:00, 23:59:59]` covering `date`. Sort keys are
/// second-granular, so the closed upper bound loses nothing.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    // ---
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + chrono::Duration::days(1) - chrono::Duration::seconds(1);
    (start, end)
}

/// One hour's summary. An average is `None` when no reading in the hour
/// carried that metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyAggregate {
    // ---
    pub hour: u32,
    pub count: usize,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pressure: Option<f64>,
}

/// Group a device's readings for `date` by UTC hour and average each metric
/// over the readings that carry it. Hours without readings are omitted;
/// the result is ordered by hour.
pub fn aggregate_hourly(
    store: &TimeSeriesStore,
    device_id: &str,
    date: NaiveDate,
) -> Vec<HourlyAggregate> {
    // ---
    let (start, end) = day_bounds(date);
    let readings = store.range_query(device_id, start, end);

    let mut hours: BTreeMap<u32, Vec<&SensorReading>> = BTreeMap::new();
    for reading in &readings {
        hours.entry(reading.timestamp.hour()).or_default().push(reading);
    }

    hours
        .into_iter()
        .map(|(hour, group)| HourlyAggregate {
            hour,
            count: group.len(),
            avg_temperature: mean(group.iter().filter_map(|r| r.temperature)),
            avg_humidity: mean(group.iter().filter_map(|r| r.humidity)),
            avg_pressure: mean(group.iter().filter_map(|r| r.pressure)),
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    // ---
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

// ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Whole-day summary for one device. Metric summaries are `None` when no
/// reading that day carried the metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    // ---
    pub date: NaiveDate,
    pub data_count: usize,
    pub temperature: Option<MetricSummary>,
    pub humidity: Option<MetricSummary>,
}

/// Compute a device's stats for `date` from the store.
pub fn compute_daily_stats(
    store: &TimeSeriesStore,
    device_id: &str,
    date: NaiveDate,
) -> DailyStats {
    // ---
    let (start, end) = day_bounds(date);
    let readings = store.range_query(device_id, start, end);

    DailyStats {
        date,
        data_count: readings.len(),
        temperature: summarize(readings.iter().filter_map(|r| r.temperature)),
        humidity: summarize(readings.iter().filter_map(|r| r.humidity)),
    }
}

fn summarize(values: impl Iterator<Item = f64>) -> Option<MetricSummary> {
    // ---
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = values.iter().sum::<f64>() / values.len() as f64;

    Some(MetricSummary { min, max, avg })
}

// ---

struct CacheEntry {
    stored_at: Instant,
    stats: DailyStats,
}

/// TTL cache of [`DailyStats`] keyed by (device id, date).
///
/// A computed value is retained until its TTL lapses or new data for that
/// day invalidates it; invalidation evicts so the next read recomputes.
/// Concurrent refreshes for the same key are harmless: the computation is
/// deterministic over the stored readings, so any writer stores the same
/// value.
pub struct DailyStatsCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, NaiveDate), CacheEntry>>,
}

impl DailyStatsCache {
    // ---
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(device_id: &str, date: NaiveDate) -> (String, NaiveDate) {
        (device_id.to_string(), date)
    }

    /// The cached value, if present and fresh.
    pub fn cached(&self, device_id: &str, date: NaiveDate) -> Option<DailyStats> {
        // ---
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&Self::key(device_id, date))
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.stats.clone())
    }

    /// Serve from cache, computing and retaining on a miss or a stale entry.
    pub fn get_or_compute(
        &self,
        store: &TimeSeriesStore,
        device_id: &str,
        date: NaiveDate,
    ) -> DailyStats {
        // ---
        if let Some(stats) = self.cached(device_id, date) {
            return stats;
        }
        self.refresh(store, device_id, date)
    }

    /// Recompute and retain, replacing whatever was cached. Called by the
    /// asynchronous stage after each new reading for the day.
    pub fn refresh(
        &self,
        store: &TimeSeriesStore,
        device_id: &str,
        date: NaiveDate,
    ) -> DailyStats {
        // ---
        let stats = compute_daily_stats(store, device_id, date);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            Self::key(device_id, date),
            CacheEntry {
                stored_at: Instant::now(),
                stats: stats.clone(),
            },
        );
        stats
    }

    /// Evict the entry so the next read recomputes from the store.
    pub fn invalidate(&self, device_id: &str, date: NaiveDate) {
        // ---
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&Self::key(device_id, date));
    }
}

impl Default for DailyStatsCache {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_TTL)
    }
}
