//! Partitioned time-series storage for sensor readings.
//!
//! Readings live in per-device-day partitions keyed by the composite keys
//! from [`crate::keys`]. Two explicit secondary indexes keep the non-primary
//! access patterns sub-linear in total data size instead of scanning:
//! - `device_index` (device id → timestamp → key pair) serves latest-N
//! - `reading_ids` (reading id → key pair) serves the asynchronous stage's
//!   reload-by-id
//!
//! The store also carries the device registry the pipeline reads (id,
//! status, location); the radius query runs a bounding-box prefilter over it
//! before the exact Haversine check.
//!
//! A write only ever touches one partition+sort key pair, so a single lock
//! around the in-process engine is all the coordination writes need.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::geo::{haversine_km, BoundingBox};
use crate::keys;
use crate::models::{Device, GeoPoint, SensorReading};

// ---

/// The composite address of a stored reading.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyPair {
    partition: String,
    sort: String,
}

#[derive(Debug, Default)]
struct StoreInner {
    // ---
    /// partition key → (sort key → reading), ordered within the partition.
    partitions: HashMap<String, BTreeMap<String, SensorReading>>,

    /// device id → (second-truncated timestamp → key pair). Backs latest-N.
    device_index: HashMap<String, BTreeMap<DateTime<Utc>, KeyPair>>,

    /// reading id → key pair. Backs reload-by-id in the asynchronous stage.
    reading_ids: HashMap<Uuid, KeyPair>,

    /// Registered devices, keyed by device id.
    devices: HashMap<String, Device>,
}

/// In-process partitioned store for readings plus the device registry.
#[derive(Debug, Default)]
pub struct TimeSeriesStore {
    inner: RwLock<StoreInner>,
}

impl TimeSeriesStore {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means some writer panicked mid-call; the maps are
    // still navigable, so recover instead of propagating the panic.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate and persist a reading under its derived keys.
    ///
    /// The keys are recomputed from the canonical timestamp on every write;
    /// a collision on (device id, second-truncated timestamp) overwrites the
    /// earlier reading, whose id mapping is dropped.
    pub fn insert(&self, reading: SensorReading) -> Result<SensorReading> {
        // ---
        reading.validate()?;

        let partition = keys::partition_key(&reading.device_id, reading.timestamp);
        let sort = keys::sort_key(reading.timestamp);
        let truncated = keys::truncate_to_second(reading.timestamp);
        let pair = KeyPair {
            partition: partition.clone(),
            sort: sort.clone(),
        };

        let mut inner = self.write();

        let evicted = inner
            .partitions
            .entry(partition)
            .or_default()
            .insert(sort, reading.clone());
        if let Some(old) = evicted {
            if old.reading_id != reading.reading_id {
                inner.reading_ids.remove(&old.reading_id);
            }
        }

        inner
            .device_index
            .entry(reading.device_id.clone())
            .or_default()
            .insert(truncated, pair.clone());
        inner.reading_ids.insert(reading.reading_id, pair);

        Ok(reading)
    }

    /// Reload a reading by id. `None` once it has been overwritten by a
    /// same-second successor.
    pub fn reading(&self, reading_id: Uuid) -> Option<SensorReading> {
        // ---
        let inner = self.read();
        let pair = inner.reading_ids.get(&reading_id)?;
        inner
            .partitions
            .get(&pair.partition)
            .and_then(|p| p.get(&pair.sort))
            .cloned()
    }

    /// All readings for a device with timestamp in `[start, end]`, ascending.
    ///
    /// Walks every daily partition the window touches and concatenates the
    /// per-partition range scans; an inverted window yields an empty result.
    pub fn range_query(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<SensorReading> {
        // ---
        if start > end {
            return Vec::new();
        }

        let lo = keys::sort_key(start);
        let hi = keys::sort_key(end);
        let inner = self.read();

        let mut out = Vec::new();
        let mut date = start.date_naive();
        let last = end.date_naive();

        while date <= last {
            let partition_key = keys::partition_key_for_date(device_id, date);
            if let Some(partition) = inner.partitions.get(&partition_key) {
                let bounds = (Bound::Included(lo.as_str()), Bound::Included(hi.as_str()));
                for reading in partition.range::<str, _>(bounds).map(|(_, r)| r) {
                    // The sort-key scan is second-granular; re-check the
                    // embedded instant against the sub-second window edges.
                    let embedded = keys::truncate_to_second(reading.timestamp);
                    if embedded >= start && embedded <= end {
                        out.push(reading.clone());
                    }
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        out
    }

    /// The most recent `limit` readings for a device, descending by
    /// timestamp. Served from the secondary index, not a partition scan.
    pub fn latest_by_device(&self, device_id: &str, limit: usize) -> Vec<SensorReading> {
        // ---
        let inner = self.read();
        let Some(index) = inner.device_index.get(device_id) else {
            return Vec::new();
        };

        index
            .iter()
            .rev()
            .take(limit)
            .filter_map(|(_, pair)| {
                inner
                    .partitions
                    .get(&pair.partition)
                    .and_then(|p| p.get(&pair.sort))
                    .cloned()
            })
            .collect()
    }

    // ---

    /// Register a device or replace its pipeline-visible fields.
    pub fn upsert_device(&self, device: Device) {
        self.write().devices.insert(device.device_id.clone(), device);
    }

    pub fn device(&self, device_id: &str) -> Option<Device> {
        self.read().devices.get(device_id).cloned()
    }

    /// All registered devices, ordered by id.
    pub fn devices(&self) -> Vec<Device> {
        // ---
        let mut out: Vec<_> = self.read().devices.values().cloned().collect();
        out.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        out
    }

    /// Devices with a known location within `radius_km` of the given point,
    /// ordered by id. Bounding-box prefilter first, exact Haversine second.
    pub fn radius_query(&self, latitude: f64, longitude: f64, radius_km: f64) -> Vec<Device> {
        // ---
        let center = GeoPoint {
            latitude,
            longitude,
        };
        let bbox = BoundingBox::around(center, radius_km);

        let mut out: Vec<_> = self
            .read()
            .devices
            .values()
            .filter(|d| {
                d.location
                    .is_some_and(|loc| bbox.contains(loc) && haversine_km(center, loc) <= radius_km)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        out
    }
}
