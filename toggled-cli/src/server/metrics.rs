use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::extract::{MatchedPath, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};

use toggled_lib::CacheStats;

use super::state::AppState;

/// Global metrics registry
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// All application metrics
pub struct Metrics {
    // Write metrics
    pub writes_total: IntCounterVec,
    pub write_duration: Histogram,

    // Eval metrics
    pub eval_total: IntCounterVec,
    pub eval_not_found: IntCounterVec,

    // Cache metrics
    pub cache_entries: IntGauge,
    pub cache_invalidations: IntGauge,

    // Storage metrics
    pub storage_backend: IntGaugeVec,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new(registry: &Registry) -> Self {
        // ── Write metrics ────────────────────────────────────────────
        let writes_total = IntCounterVec::new(
            Opts::new("toggled_flag_writes_total", "Total number of flag writes"),
            &["status"],
        )
        .expect("failed to create writes_total metric");

        let write_duration = Histogram::with_opts(
            HistogramOpts::new(
                "toggled_flag_write_duration_seconds",
                "Duration of flag writes including cache invalidation",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )
        .expect("failed to create write_duration metric");

        // ── Eval metrics ─────────────────────────────────────────────
        let eval_total = IntCounterVec::new(
            Opts::new("toggled_eval_total", "Total number of flag decisions served"),
            &["environment", "cache"],
        )
        .expect("failed to create eval_total metric");

        let eval_not_found = IntCounterVec::new(
            Opts::new(
                "toggled_eval_not_found_total",
                "Decisions requested for flags that do not exist",
            ),
            &["environment"],
        )
        .expect("failed to create eval_not_found metric");

        // ── Cache metrics ────────────────────────────────────────────
        let cache_entries = IntGauge::new(
            "toggled_cache_entries",
            "Number of cached flag decisions",
        )
        .expect("failed to create cache_entries metric");

        let cache_invalidations = IntGauge::new(
            "toggled_cache_invalidations",
            "Whole-cache invalidations since the service started",
        )
        .expect("failed to create cache_invalidations metric");

        // ── Storage metrics ──────────────────────────────────────────
        let storage_backend = IntGaugeVec::new(
            Opts::new("toggled_storage_backend", "Storage backend type (1=active)"),
            &["type"],
        )
        .expect("failed to create storage_backend metric");

        // ── HTTP request metrics ──────────────────────────────────────
        let http_requests_total = IntCounterVec::new(
            Opts::new("toggled_http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("failed to create http_requests_total metric");

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "toggled_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["method", "path"],
        )
        .expect("failed to create http_request_duration metric");

        // Register all metrics with the registry
        registry.register(Box::new(writes_total.clone())).expect("register writes_total");
        registry.register(Box::new(write_duration.clone())).expect("register write_duration");
        registry.register(Box::new(eval_total.clone())).expect("register eval_total");
        registry.register(Box::new(eval_not_found.clone())).expect("register eval_not_found");
        registry.register(Box::new(cache_entries.clone())).expect("register cache_entries");
        registry
            .register(Box::new(cache_invalidations.clone()))
            .expect("register cache_invalidations");
        registry.register(Box::new(storage_backend.clone())).expect("register storage_backend");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("register http_requests_total");
        registry
            .register(Box::new(http_request_duration.clone()))
            .expect("register http_request_duration");

        Self {
            writes_total,
            write_duration,
            eval_total,
            eval_not_found,
            cache_entries,
            cache_invalidations,
            storage_backend,
            http_requests_total,
            http_request_duration,
        }
    }
}

/// Get the global metrics instance, initializing on first call
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = REGISTRY.get_or_init(Registry::new);
        Metrics::new(registry)
    })
}

/// Label used for requests that matched no route.
const UNMATCHED_PATH: &str = "unmatched";

/// Copy the service's cache counters into the registry.
pub fn record_cache_stats(stats: &CacheStats) {
    let m = metrics();
    m.cache_entries.set(stats.entries as i64);
    m.cache_invalidations.set(stats.invalidations as i64);
}

/// Axum handler for GET /metrics — returns Prometheus text format
pub async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    record_cache_stats(&state.service.cache_stats().await);

    let registry = REGISTRY.get_or_init(Registry::new);
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Axum middleware that records HTTP request count and duration.
pub async fn track_metrics(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let m = metrics();
    m.http_requests_total
        .with_label_values(&[&method, &path, &status])
        .inc();
    m.http_request_duration
        .with_label_values(&[&method, &path])
        .observe(elapsed);

    response
}
