//! Configuration loader for the `sensorgrid` backend service.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). Consolidating the logic here keeps
//! `env::var` calls from scattering through the codebase.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// TCP port the HTTP server binds.
    pub http_port: u16,

    /// Number of asynchronous pipeline workers.
    pub worker_count: u32,

    /// Capacity of the bounded task queue; a full queue backpressures
    /// ingestion instead of dropping tasks.
    pub task_queue_depth: u32,

    /// Maximum retries for a transiently failing task.
    pub task_max_retries: u32,

    /// Base backoff between retries, in milliseconds (doubles per attempt).
    pub task_retry_backoff_ms: u32,

    /// Daily stats cache retention, in hours.
    pub daily_stats_ttl_hours: u32,

    /// Webhook endpoint for alert/notification delivery. When unset,
    /// deliveries are logged instead.
    pub alert_webhook_url: Option<String>,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `HTTP_PORT` – server port (default: 8080)
/// - `WORKER_COUNT` – pipeline worker pool size (default: 4)
/// - `TASK_QUEUE_DEPTH` – task queue capacity (default: 1024)
/// - `TASK_MAX_RETRIES` – retries per transiently failing task (default: 3)
/// - `TASK_RETRY_BACKOFF_MS` – base retry backoff (default: 500)
/// - `DAILY_STATS_TTL_HOURS` – stats cache retention (default: 25)
/// - `ALERT_WEBHOOK_URL` – outbound notification endpoint (default: unset)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let http_port = u16::try_from(parse_env_u32!("HTTP_PORT", 8080))
        .map_err(|_| anyhow!("Invalid HTTP_PORT: out of range"))?;
    let worker_count = parse_env_u32!("WORKER_COUNT", 4);
    let task_queue_depth = parse_env_u32!("TASK_QUEUE_DEPTH", 1024);
    let task_max_retries = parse_env_u32!("TASK_MAX_RETRIES", 3);
    let task_retry_backoff_ms = parse_env_u32!("TASK_RETRY_BACKOFF_MS", 500);
    let daily_stats_ttl_hours = parse_env_u32!("DAILY_STATS_TTL_HOURS", 25);
    let alert_webhook_url = env::var("ALERT_WEBHOOK_URL").ok();

    Ok(Config {
        http_port,
        worker_count,
        task_queue_depth,
        task_max_retries,
        task_retry_backoff_ms,
        daily_stats_ttl_hours,
        alert_webhook_url,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  HTTP_PORT             : {}", self.http_port);
        tracing::info!("  WORKER_COUNT          : {}", self.worker_count);
        tracing::info!("  TASK_QUEUE_DEPTH      : {}", self.task_queue_depth);
        tracing::info!("  TASK_MAX_RETRIES      : {}", self.task_max_retries);
        tracing::info!("  TASK_RETRY_BACKOFF_MS : {}", self.task_retry_backoff_ms);
        tracing::info!("  DAILY_STATS_TTL_HOURS : {}", self.daily_stats_ttl_hours);
        tracing::info!(
            "  ALERT_WEBHOOK_URL     : {}",
            self.alert_webhook_url.as_deref().unwrap_or("(not set)")
        );
    }
}
