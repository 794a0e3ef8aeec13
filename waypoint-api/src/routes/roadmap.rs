//! Roadmap REST API Routes
//!
//! - `GET  /roadmaps/:program` - cached or freshly generated, enriched roadmap
//! - `GET  /roadmaps/:program/fast` - cached roadmap, or an unenriched one without caching
//! - `POST /roadmaps/:program/steps/:step/videos` - enrich a single step on demand

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use waypoint_core::StepVideos;
use waypoint_pipeline::{RoadmapResponse, RoadmapService};

use crate::constants::{MAX_PROGRAM_NAME_LEN, MAX_TOPICS_PER_REQUEST};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Body of a step-videos request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StepVideosRequest {
    /// Topics to enrich. Empty means "use the topics of the cached step".
    #[serde(default)]
    pub topics: Vec<String>,
}

fn validate_program(program: &str) -> ApiResult<()> {
    if program.chars().count() > MAX_PROGRAM_NAME_LEN {
        return Err(ApiError::validation_failed(format!(
            "Program name exceeds {} characters",
            MAX_PROGRAM_NAME_LEN
        )));
    }
    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/v1/roadmaps/:program
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/roadmaps/{program}",
    tag = "Roadmaps",
    params(("program" = String, Path, description = "Program name, matched exactly after trimming")),
    responses(
        (status = 200, description = "Roadmap, from cache or freshly generated", body = RoadmapResponse),
        (status = 400, description = "Invalid program name", body = ApiError),
        (status = 502, description = "Curriculum synthesis failed", body = ApiError),
        (status = 503, description = "No synthesizer configured and no cached roadmap", body = ApiError),
    ),
))]
pub async fn get_roadmap(
    State(service): State<Arc<RoadmapService>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<RoadmapResponse>> {
    let Path(program) = path?;
    validate_program(&program)?;

    let result = service.get_roadmap(&program).await;
    if let Some(m) = metrics() {
        m.record_roadmap_request("full", result.as_ref().ok().map(|r| r.from_cache));
        if let Some(summary) = result.as_ref().ok().and_then(|r| r.enrichment.as_ref()) {
            m.record_enrichment(summary);
        }
    }
    Ok(Json(result?))
}

/// GET /api/v1/roadmaps/:program/fast
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/v1/roadmaps/{program}/fast",
    tag = "Roadmaps",
    params(("program" = String, Path, description = "Program name, matched exactly after trimming")),
    responses(
        (status = 200, description = "Cached roadmap, or an unenriched roadmap that is not cached", body = RoadmapResponse),
        (status = 400, description = "Invalid program name", body = ApiError),
        (status = 502, description = "Curriculum synthesis failed", body = ApiError),
        (status = 503, description = "No synthesizer configured and no cached roadmap", body = ApiError),
    ),
))]
pub async fn get_roadmap_fast(
    State(service): State<Arc<RoadmapService>>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<RoadmapResponse>> {
    let Path(program) = path?;
    validate_program(&program)?;

    let result = service.get_roadmap_fast(&program).await;
    if let Some(m) = metrics() {
        m.record_roadmap_request("fast", result.as_ref().ok().map(|r| r.from_cache));
    }
    Ok(Json(result?))
}

/// POST /api/v1/roadmaps/:program/steps/:step/videos
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/v1/roadmaps/{program}/steps/{step}/videos",
    tag = "Roadmaps",
    params(
        ("program" = String, Path, description = "Program name"),
        ("step" = u32, Path, description = "1-based step number"),
    ),
    request_body = StepVideosRequest,
    responses(
        (status = 200, description = "Videos per topic, in topic order", body = StepVideos),
        (status = 400, description = "Invalid step number or request body", body = ApiError),
        (status = 404, description = "No topics given and the step is not cached", body = ApiError),
    ),
))]
pub async fn get_step_videos(
    State(service): State<Arc<RoadmapService>>,
    path: Result<Path<(String, u32)>, PathRejection>,
    body: Result<Json<StepVideosRequest>, JsonRejection>,
) -> ApiResult<Json<StepVideos>> {
    let Path((program, step)) = path?;
    let Json(request) = body?;
    validate_program(&program)?;

    if request.topics.len() > MAX_TOPICS_PER_REQUEST {
        return Err(ApiError::validation_failed(format!(
            "At most {} topics per request",
            MAX_TOPICS_PER_REQUEST
        ))
        .with_details(serde_json::json!({ "topics": request.topics.len() })));
    }

    let videos = service.get_step_videos(&program, step, request.topics).await?;
    Ok(Json(videos))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:program", get(get_roadmap))
        .route("/:program/fast", get(get_roadmap_fast))
        .route("/:program/steps/:step/videos", post(get_step_videos))
}
