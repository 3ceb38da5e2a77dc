//! Application entry point for the `sensorgrid` backend service.
//!
//! This binary orchestrates the full startup sequence for the telemetry
//! pipeline API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Constructing the time-series store, stats cache, notifier and task
//!   queue as explicit dependencies of the ingestion pipeline
//! - Spawning the asynchronous worker pool
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `HTTP_PORT` (optional) – server port (default: 8080)
//! - `WORKER_COUNT` (optional) – pipeline worker pool size (default: 4)
//! - `ALERT_WEBHOOK_URL` (optional) – outbound notification endpoint
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list. This module follows the Explicit
//! Module Boundary Pattern (EMBP) by delegating configuration parsing to
//! `config` and route registration to `routes`.

use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use sensorgrid::aggregate::DailyStatsCache;
use sensorgrid::config;
use sensorgrid::notify::{LogNotifier, Notifier, WebhookNotifier};
use sensorgrid::pipeline::IngestionPipeline;
use sensorgrid::queue::{self, RetryPolicy, TaskQueue};
use sensorgrid::routes::{self, AppState};
use sensorgrid::store::TimeSeriesStore;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let store = Arc::new(TimeSeriesStore::new());
    let stats = Arc::new(DailyStatsCache::new(Duration::from_secs(
        u64::from(cfg.daily_stats_ttl_hours) * 3600,
    )));
    let notifier: Arc<dyn Notifier> = match &cfg.alert_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let (queue, receiver) = TaskQueue::bounded(cfg.task_queue_depth as usize);
    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&store),
        Arc::clone(&stats),
        notifier,
        queue,
    ));

    let policy = RetryPolicy {
        max_retries: cfg.task_max_retries,
        base_backoff: Duration::from_millis(u64::from(cfg.task_retry_backoff_ms)),
    };
    let workers = queue::spawn_workers(
        cfg.worker_count as usize,
        receiver,
        Arc::clone(&pipeline),
        policy,
    );
    tracing::info!("Started {} pipeline workers", workers.len());

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(AppState {
        store,
        stats,
        pipeline,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `AXUM_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
