use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all songvault metrics
const PREFIX: &str = "songvault";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Pipeline
    pub static ref PIPELINE_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_pipeline_runs_total"), "Ingestion runs by outcome"),
        &["outcome"]
    ).expect("Failed to create pipeline_runs_total metric");

    pub static ref PIPELINE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_pipeline_duration_seconds"),
            "Duration of ingestion runs in seconds"
        )
        .buckets(vec![1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0, 160.0])
    ).expect("Failed to create pipeline_duration_seconds metric");

    pub static ref UPLOAD_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_upload_attempts_total"), "Blob store upload attempts"),
        &["result"]
    ).expect("Failed to create upload_attempts_total metric");

    pub static ref PARSE_SHORT_CIRCUITS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_parse_short_circuits_total"),
        "Parse requests answered from an already resolved asset"
    ).expect("Failed to create parse_short_circuits_total metric");

    // Playback
    pub static ref PLAY_INFO_REQUESTS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_play_info_requests_total"),
        "Play info lookups"
    ).expect("Failed to create play_info_requests_total metric");

    pub static ref STREAM_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_stream_requests_total"), "Proxied stream requests by status"),
        &["status"]
    ).expect("Failed to create stream_requests_total metric");

    // Catalog
    pub static ref CATALOG_ASSETS_TOTAL: Gauge = Gauge::new(
        format!("{PREFIX}_catalog_assets_total"),
        "Active assets in the catalog"
    ).expect("Failed to create catalog_assets_total metric");

    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "API errors by type and status"),
        &["error_type", "status"]
    ).expect("Failed to create errors_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(PIPELINE_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(UPLOAD_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PARSE_SHORT_CIRCUITS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PLAY_INFO_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STREAM_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_ASSETS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn set_catalog_assets(count: usize) {
    CATALOG_ASSETS_TOTAL.set(count as f64);
}

/// `outcome` is "success" or the name of the failed stage.
pub fn record_pipeline_run(outcome: &str, duration: Duration) {
    PIPELINE_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    PIPELINE_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_upload_attempt(success: bool) {
    let result = if success { "success" } else { "failure" };
    UPLOAD_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_parse_short_circuit() {
    PARSE_SHORT_CIRCUITS_TOTAL.inc();
}

pub fn record_play_info_request() {
    PLAY_INFO_REQUESTS_TOTAL.inc();
}

pub fn record_stream_request(status: u16) {
    STREAM_REQUESTS_TOTAL
        .with_label_values(&[&status.to_string()])
        .inc();
}

/// Record an error
pub fn record_error(error_type: &str, status: u16) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, &status.to_string()])
        .inc();
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    // RSS is reported in kB
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
