//! Core library for the `sensorgrid` telemetry backend.
//!
//! The pipeline is assembled from explicitly constructed parts rather than
//! global singletons, so every seam can be substituted in tests:
//! - [`store::TimeSeriesStore`] – partitioned time-series storage with
//!   explicit secondary indexes for latest-N and reload-by-id queries
//! - [`quality`] / [`alerts`] – per-reading quality scoring and threshold
//!   alert evaluation
//! - [`aggregate`] – hourly aggregation and the TTL'd daily stats cache
//! - [`queue`] – the typed task queue and retrying worker pool
//! - [`pipeline::IngestionPipeline`] – the synchronous ingest stage and the
//!   asynchronous processing stage run by the workers
//! - [`routes`] – the Axum HTTP boundary (EMBP gateway pattern)

pub mod aggregate;
pub mod alerts;
pub mod config;
pub mod error;
pub mod geo;
pub mod keys;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod quality;
pub mod queue;
pub mod routes;
pub mod store;

pub use config::Config;
pub use error::{PipelineError, Result, ValidationErrors};

// Re-exported so downstream code (the binary, integration tests) can reach
// the core vocabulary types without knowing the module layout.
pub use models::{Device, DeviceStatus, GeoPoint, QualityTier, RawReading, SensorReading};
