//! Cache Maintenance REST API Routes
//!
//! Operator endpoints over the roadmap cache. None of them generate roadmaps.

use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use waypoint_core::CacheStats;
use waypoint_pipeline::{CacheMaintenance, RoadmapService};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Result of deleting one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeleteEntryResponse {
    pub program: String,
    /// False when there was nothing to delete.
    pub deleted: bool,
}

/// Result of restarting an entry's TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RefreshEntryResponse {
    pub program: String,
    /// Lifetime granted from now.
    pub ttl_seconds: u64,
}

/// Number of rows removed by a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RemovedResponse {
    pub removed: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/v1/cache/stats
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/cache/stats",
    tag = "Cache",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStats),
        (status = 503, description = "Cache store unavailable", body = ApiError),
    ),
))]
pub async fn get_stats(State(maintenance): State<CacheMaintenance>) -> ApiResult<Json<CacheStats>> {
    let stats = maintenance.stats().await?;
    if let Some(m) = metrics() {
        m.set_cache_entries(&stats);
    }
    Ok(Json(stats))
}

/// DELETE /api/v1/cache/entries/:program
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/v1/cache/entries/{program}",
    tag = "Cache",
    params(("program" = String, Path, description = "Program name")),
    responses(
        (status = 200, description = "Entry deleted, or already absent", body = DeleteEntryResponse),
        (status = 503, description = "Cache store unavailable", body = ApiError),
    ),
))]
pub async fn delete_entry(
    State(maintenance): State<CacheMaintenance>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<DeleteEntryResponse>> {
    let Path(program) = path?;
    let deleted = maintenance.delete(&program).await?;
    Ok(Json(DeleteEntryResponse {
        program: program.trim().to_string(),
        deleted,
    }))
}

/// POST /api/v1/cache/entries/:program/refresh
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/cache/entries/{program}/refresh",
    tag = "Cache",
    params(("program" = String, Path, description = "Program name")),
    responses(
        (status = 200, description = "TTL restarted", body = RefreshEntryResponse),
        (status = 404, description = "No live entry for the program", body = ApiError),
        (status = 503, description = "Cache store unavailable", body = ApiError),
    ),
))]
pub async fn refresh_entry(
    State(maintenance): State<CacheMaintenance>,
    State(service): State<Arc<RoadmapService>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<RefreshEntryResponse>> {
    let Path(program) = path?;
    maintenance.refresh_ttl(&program).await?;
    Ok(Json(RefreshEntryResponse {
        program: program.trim().to_string(),
        ttl_seconds: service.cache().ttl().as_secs(),
    }))
}

/// DELETE /api/v1/cache
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/v1/cache",
    tag = "Cache",
    responses(
        (status = 200, description = "All entries removed", body = RemovedResponse),
        (status = 503, description = "Cache store unavailable", body = ApiError),
    ),
))]
pub async fn clear_cache(
    State(maintenance): State<CacheMaintenance>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = maintenance.clear().await?;
    Ok(Json(RemovedResponse { removed }))
}

/// POST /api/v1/cache/invalidate-expired
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/cache/invalidate-expired",
    tag = "Cache",
    responses(
        (status = 200, description = "Expired entries removed", body = RemovedResponse),
        (status = 503, description = "Cache store unavailable", body = ApiError),
    ),
))]
pub async fn invalidate_expired(
    State(maintenance): State<CacheMaintenance>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = maintenance.invalidate_expired().await?;
    if let Some(m) = metrics() {
        m.record_sweep("manual", removed);
    }
    Ok(Json(RemovedResponse { removed }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", delete(clear_cache))
        .route("/stats", get(get_stats))
        .route("/entries/:program", delete(delete_entry))
        .route("/entries/:program/refresh", post(refresh_entry))
        .route("/invalidate-expired", post(invalidate_expired))
}
