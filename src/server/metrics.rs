use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all media display metrics
const PREFIX: &str = "media_display";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Authentication Metrics
    pub static ref AUTH_LOGIN_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_auth_login_attempts_total"), "Total login attempts"),
        &["status"]
    ).expect("Failed to create auth_login_attempts_total metric");

    pub static ref AUTH_LOGIN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_auth_login_duration_seconds"),
            "Login request duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0])
    ).expect("Failed to create auth_login_duration_seconds metric");

    pub static ref AUTH_TOKEN_RENEWALS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_auth_token_renewals_total"), "Token renewal requests"),
        &["status"]
    ).expect("Failed to create auth_token_renewals_total metric");

    // Selection Metrics
    pub static ref SELECTION_CHANGES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_selection_changes_total"), "Changes of the selected media"),
        &["action"]
    ).expect("Failed to create selection_changes_total metric");

    // Media Metrics
    pub static ref MEDIA_UPLOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_media_uploads_total"), "Media upload attempts"),
        &["status"]
    ).expect("Failed to create media_uploads_total metric");

    pub static ref MEDIA_UPLOADED_BYTES_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_media_uploaded_bytes_total"),
        "Bytes of media stored by uploads"
    ).expect("Failed to create media_uploaded_bytes_total metric");

    pub static ref MEDIA_DELETES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_media_deletes_total"), "Media delete attempts"),
        &["status"]
    ).expect("Failed to create media_deletes_total metric");

    pub static ref MEDIA_FILES: Gauge = Gauge::new(
        format!("{PREFIX}_media_files"),
        "Number of stored media files, as of the last listing"
    ).expect("Failed to create media_files metric");

    // Playlist Metrics
    pub static ref PLAYLIST_PRUNED_ACCOUNTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_playlist_pruned_accounts_total"),
            "Account settings touched while removing deleted media"
        ),
        &["outcome"]
    ).expect("Failed to create playlist_pruned_accounts_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_TOKEN_RENEWALS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SELECTION_CHANGES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MEDIA_UPLOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MEDIA_UPLOADED_BYTES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MEDIA_DELETES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MEDIA_FILES.clone()));
    let _ = REGISTRY.register(Box::new(PLAYLIST_PRUNED_ACCOUNTS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Maps a request path to a bounded label, media names never become labels.
pub fn categorize_endpoint(path: &str) -> &'static str {
    let rest = match path.strip_prefix("/api/") {
        Some(rest) => rest,
        None => return if path == "/" { "home" } else { "frontend" },
    };
    match rest.split('/').next().unwrap_or("") {
        "login" => "login",
        "refresh" => "refresh",
        "files" => "files",
        "upload" => "upload",
        "delete" => "delete",
        "select" => "select",
        "deselect" => "deselect",
        "selected" => "selected",
        "settings" => "settings",
        "uploads" => "uploads",
        _ => "other",
    }
}

/// Record an HTTP request
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

/// Record a login attempt
pub fn record_login_attempt(status: &str, duration: Duration) {
    AUTH_LOGIN_ATTEMPTS_TOTAL.with_label_values(&[status]).inc();

    AUTH_LOGIN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_token_renewal(status: &str) {
    AUTH_TOKEN_RENEWALS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_selection_change(action: &str) {
    SELECTION_CHANGES_TOTAL.with_label_values(&[action]).inc();
}

pub fn record_upload(status: &str, bytes: usize) {
    MEDIA_UPLOADS_TOTAL.with_label_values(&[status]).inc();
    MEDIA_UPLOADED_BYTES_TOTAL.inc_by(bytes as u64);
}

pub fn record_delete(status: &str) {
    MEDIA_DELETES_TOTAL.with_label_values(&[status]).inc();
}

pub fn set_media_files(count: usize) {
    MEDIA_FILES.set(count as f64);
}

pub fn record_prune(updated: usize, failed: usize) {
    PLAYLIST_PRUNED_ACCOUNTS_TOTAL
        .with_label_values(&["updated"])
        .inc_by(updated as f64);
    PLAYLIST_PRUNED_ACCOUNTS_TOTAL
        .with_label_values(&["failed"])
        .inc_by(failed as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
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
