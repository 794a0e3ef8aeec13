//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Cache store connectivity and collaborator availability

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use waypoint_core::{HealthCheck, HealthStatus};
use waypoint_llm::SynthesizerCapability;
use waypoint_pipeline::RoadmapService;

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub components: Vec<HealthCheck>,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
))]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
))]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check
///
/// Unhealthy (503) only when the cache store is unreachable. A missing
/// synthesizer degrades readiness: cached roadmaps are still served.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse),
    ),
))]
pub async fn readiness(
    State(service): State<Arc<RoadmapService>>,
    State(start_time): State<Instant>,
) -> impl IntoResponse {
    let components = vec![
        check_store(&service).await,
        check_synthesizer(service.synthesizer()),
        HealthCheck::healthy(format!(
            "video_fetcher:{}",
            service.scheduler().fetcher().provider_name()
        )),
    ];

    let overall_status = components
        .iter()
        .fold(HealthStatus::Healthy, |acc, c| acc.worst(c.status));

    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            components,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

async fn check_store(service: &RoadmapService) -> HealthCheck {
    let store = service.cache().store();
    let component = format!("cache_store:{}", store.backend_name());
    let start = Instant::now();

    match store.ping().await {
        Ok(()) => HealthCheck::healthy(component)
            .with_response_time(start.elapsed().as_millis() as i64),
        Err(e) => HealthCheck::unhealthy(component, format!("Store check failed: {}", e)),
    }
}

fn check_synthesizer(capability: &SynthesizerCapability) -> HealthCheck {
    match capability {
        SynthesizerCapability::Available(s) => {
            HealthCheck::healthy(format!("synthesizer:{}", s.provider_name()))
        }
        SynthesizerCapability::Unavailable => HealthCheck::degraded(
            "synthesizer",
            "No synthesizer configured; only cached roadmaps can be served",
        ),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
