//! OpenAPI Specification for the Waypoint API
//!
//! Generated with utoipa from the route annotations and the schema derives on
//! the domain types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::cache::{DeleteEntryResponse, RefreshEntryResponse, RemovedResponse};
use crate::routes::health::{HealthDetails, HealthResponse};
use crate::routes::roadmap::StepVideosRequest;
use crate::routes::{cache, health, roadmap};
use crate::telemetry::metrics;

use waypoint_core::{
    CacheStats, HealthCheck, HealthStatus, RoadmapPayload, RoadmapStep, StepVideos, TopEntry,
    TopicVideos, VideoReference,
};
use waypoint_pipeline::{EnrichmentSummary, RoadmapResponse};

/// OpenAPI document for the Waypoint API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Waypoint API",
        version = "0.1.0",
        description = "Learning roadmaps for academic programs, enriched with instructional videos",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Roadmaps", description = "Roadmap generation and lookup"),
        (name = "Cache", description = "Operator maintenance of the roadmap cache"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Roadmap Routes ===
        roadmap::get_roadmap,
        roadmap::get_roadmap_fast,
        roadmap::get_step_videos,

        // === Cache Routes ===
        cache::get_stats,
        cache::delete_entry,
        cache::refresh_entry,
        cache::clear_cache,
        cache::invalidate_expired,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,

        metrics::metrics_handler,
    ),
    components(
        schemas(
            RoadmapResponse,
            RoadmapPayload,
            RoadmapStep,
            VideoReference,
            EnrichmentSummary,
            StepVideos,
            TopicVideos,
            StepVideosRequest,
            CacheStats,
            TopEntry,
            DeleteEntryResponse,
            RefreshEntryResponse,
            RemovedResponse,
            HealthResponse,
            HealthDetails,
            HealthCheck,
            HealthStatus,
            ApiError,
            ErrorCode,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
