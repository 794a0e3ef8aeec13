//! Prometheus Metrics Definitions
//!
//! Defines all Waypoint metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram, register_histogram_vec,
    CounterVec, Encoder, GaugeVec, Histogram, HistogramVec, TextEncoder,
};
use waypoint_core::CacheStats;
use waypoint_pipeline::EnrichmentSummary;
use waypoint_storage::{log_observer, ErrorObserver, SideTaskError};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s, 60s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Enrichment run duration buckets (seconds)
const ENRICHMENT_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<WaypointMetrics>> = Lazy::new(WaypointMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static WaypointMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all Waypoint metrics.
#[derive(Clone)]
pub struct WaypointMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Roadmap lookups - labels: mode (full, fast), result (hit, miss, error)
    pub roadmap_requests_total: CounterVec,

    /// Enriched topic outcomes - labels: outcome (enriched, degraded, unsettled)
    pub enrichment_topics_total: CounterVec,

    /// Enrichment runs that hit a deadline - labels: scope (step, overall)
    pub enrichment_timeouts_total: CounterVec,

    /// Wall time of one enrichment run
    pub enrichment_duration_seconds: Histogram,

    /// Cache rows by state at the last stats read - labels: state
    pub cache_entries: GaugeVec,

    /// Expired rows removed - labels: trigger (sweeper, manual)
    pub cache_swept_total: CounterVec,

    /// Dropped or failed best-effort side tasks - labels: task, kind
    pub side_task_errors_total: CounterVec,
}

impl WaypointMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "waypoint_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "waypoint_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            roadmap_requests_total: register_counter_vec!(
                "waypoint_roadmap_requests_total",
                "Roadmap lookups by mode and result",
                &["mode", "result"]
            )
            .map_err(|e| registration_error("roadmap_requests_total", e))?,

            enrichment_topics_total: register_counter_vec!(
                "waypoint_enrichment_topics_total",
                "Topics processed by the enrichment scheduler",
                &["outcome"]
            )
            .map_err(|e| registration_error("enrichment_topics_total", e))?,

            enrichment_timeouts_total: register_counter_vec!(
                "waypoint_enrichment_timeouts_total",
                "Enrichment deadlines reached",
                &["scope"]
            )
            .map_err(|e| registration_error("enrichment_timeouts_total", e))?,

            enrichment_duration_seconds: register_histogram!(
                "waypoint_enrichment_duration_seconds",
                "Enrichment run duration in seconds",
                ENRICHMENT_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("enrichment_duration_seconds", e))?,

            cache_entries: register_gauge_vec!(
                "waypoint_cache_entries",
                "Roadmap cache rows by state",
                &["state"]
            )
            .map_err(|e| registration_error("cache_entries", e))?,

            cache_swept_total: register_counter_vec!(
                "waypoint_cache_swept_total",
                "Expired roadmap cache rows removed",
                &["trigger"]
            )
            .map_err(|e| registration_error("cache_swept_total", e))?,

            side_task_errors_total: register_counter_vec!(
                "waypoint_side_task_errors_total",
                "Best-effort side tasks that were dropped or failed",
                &["task", "kind"]
            )
            .map_err(|e| registration_error("side_task_errors_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a roadmap lookup. `from_cache` is `None` when the lookup failed.
    pub fn record_roadmap_request(&self, mode: &str, from_cache: Option<bool>) {
        let result = match from_cache {
            Some(true) => "hit",
            Some(false) => "miss",
            None => "error",
        };
        self.roadmap_requests_total
            .with_label_values(&[mode, result])
            .inc();
    }

    /// Record the outcome of one enrichment run.
    pub fn record_enrichment(&self, summary: &EnrichmentSummary) {
        self.enrichment_topics_total
            .with_label_values(&["enriched"])
            .inc_by(summary.topics_enriched as f64);
        self.enrichment_topics_total
            .with_label_values(&["degraded"])
            .inc_by(summary.topics_degraded as f64);
        self.enrichment_topics_total
            .with_label_values(&["unsettled"])
            .inc_by(summary.topics_unsettled as f64);
        if summary.steps_timed_out > 0 {
            self.enrichment_timeouts_total
                .with_label_values(&["step"])
                .inc_by(summary.steps_timed_out as f64);
        }
        if summary.timed_out {
            self.enrichment_timeouts_total
                .with_label_values(&["overall"])
                .inc();
        }
        self.enrichment_duration_seconds
            .observe(summary.elapsed_ms as f64 / 1000.0);
    }

    /// Publish row counts from a stats read.
    pub fn set_cache_entries(&self, stats: &CacheStats) {
        self.cache_entries
            .with_label_values(&["total"])
            .set(stats.total as f64);
        self.cache_entries
            .with_label_values(&["active"])
            .set(stats.active as f64);
        self.cache_entries
            .with_label_values(&["expired"])
            .set(stats.expired as f64);
    }

    /// Record rows removed by a sweep.
    pub fn record_sweep(&self, trigger: &str, removed: u64) {
        self.cache_swept_total
            .with_label_values(&[trigger])
            .inc_by(removed as f64);
    }

    /// Record a dropped or failed side task.
    pub fn record_side_task_error(&self, err: &SideTaskError) {
        let kind = match err {
            SideTaskError::Rejected { .. } => "rejected",
            SideTaskError::Failed { .. } => "failed",
        };
        self.side_task_errors_total
            .with_label_values(&[err.task(), kind])
            .inc();
    }
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Side task observer that logs and counts every dropped or failed task.
pub fn side_task_observer() -> ErrorObserver {
    let log = log_observer();
    Arc::new(move |err: &SideTaskError| {
        log(err);
        if let Some(m) = metrics() {
            m.record_side_task_error(err);
        }
    })
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn registered() -> Result<&'static WaypointMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = registered()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_enrichment() -> Result<(), String> {
        let metrics = registered()?;
        let before = metrics
            .enrichment_topics_total
            .with_label_values(&["degraded"])
            .get();
        metrics.record_enrichment(&EnrichmentSummary {
            steps_total: 2,
            topics_total: 5,
            topics_enriched: 3,
            topics_degraded: 2,
            timed_out: true,
            elapsed_ms: 1500,
            ..EnrichmentSummary::default()
        });
        let after = metrics
            .enrichment_topics_total
            .with_label_values(&["degraded"])
            .get();
        assert!(after - before >= 2.0);
        Ok(())
    }

    #[test]
    fn test_side_task_observer_counts() -> Result<(), String> {
        let metrics = registered()?;
        let observer = side_task_observer();
        let counter = metrics
            .side_task_errors_total
            .with_label_values(&["record_access", "rejected"]);
        let before = counter.get();
        observer(&SideTaskError::Rejected {
            task: "record_access",
        });
        assert!(counter.get() - before >= 1.0);
        Ok(())
    }

    #[test]
    fn test_set_cache_entries() -> Result<(), String> {
        let metrics = registered()?;
        metrics.set_cache_entries(&CacheStats {
            total: 4,
            active: 3,
            expired: 1,
            ttl_seconds: 3600,
            hits: 0,
            misses: 0,
            hit_rate: 0.0,
            top_entries: Vec::new(),
        });
        assert_eq!(metrics.cache_entries.with_label_values(&["active"]).get(), 3.0);
        Ok(())
    }
}
