//! Router Integration Tests
//!
//! Drives the full Axum router with `tower::ServiceExt::oneshot` over an
//! in-memory cache, a manual clock, and mocked synthesis and video search.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use waypoint_api::{create_router, ApiConfig, AppState};
use waypoint_core::{CacheConfig, ManualClock, SynthesisError};
use waypoint_llm::SynthesizerCapability;
use waypoint_pipeline::{EnrichmentScheduler, RoadmapService};
use waypoint_storage::{InMemoryPrerequisiteGraph, InMemoryRoadmapStore, RoadmapCache, RoadmapStore};
use waypoint_test_utils::{fixtures, FailingStore, MockSynthesizer, MockVideoFetcher};

// ============================================================================
// HARNESS
// ============================================================================

const TTL: Duration = Duration::from_secs(3600);

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn app_with(store: Arc<dyn RoadmapStore>, synthesizer: SynthesizerCapability) -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let cache = Arc::new(RoadmapCache::new(
        store,
        clock.clone(),
        CacheConfig::default().with_ttl(TTL),
    ));
    let scheduler = EnrichmentScheduler::new(
        Arc::new(MockVideoFetcher::new()),
        fixtures::enrichment_config(2, 4),
    );
    let service = Arc::new(RoadmapService::new(
        cache,
        Arc::new(InMemoryPrerequisiteGraph::new()),
        synthesizer,
        scheduler,
    ));

    TestApp {
        router: create_router(AppState::new(service), &ApiConfig::default()),
        clock,
    }
}

fn app() -> TestApp {
    app_with(
        Arc::new(InMemoryRoadmapStore::new()),
        SynthesizerCapability::available(Arc::new(MockSynthesizer::new(fixtures::curriculum(
            3, 2,
        )))),
    )
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }
}

// ============================================================================
// ROADMAPS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_roadmap_miss_then_hit() {
    let app = app();

    let (status, first) = app.get("/api/v1/roadmaps/Biology").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["from_cache"], false);
    assert_eq!(first["roadmap"]["program"], "Biology");
    assert_eq!(first["roadmap"]["steps"].as_array().map(Vec::len), Some(3));
    assert_eq!(first["enrichment"]["topics_total"], 6);

    let (status, second) = app.get("/api/v1/roadmaps/Biology").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["from_cache"], true);
    assert!(second.get("enrichment").is_none());
    assert_eq!(second["roadmap"], first["roadmap"]);
}

#[tokio::test(start_paused = true)]
async fn test_fast_roadmap_is_not_cached() {
    let app = app();

    let (status, body) = app.get("/api/v1/roadmaps/Biology/fast").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from_cache"], false);

    let (_, stats) = app.get("/api/v1/cache/stats").await;
    assert_eq!(stats["total"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_synthesizer_is_503() {
    let app = app_with(Arc::new(InMemoryRoadmapStore::new()), SynthesizerCapability::Unavailable);

    let (status, body) = app.get("/api/v1/roadmaps/Biology").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SYNTHESIZER_UNAVAILABLE");
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_failure_is_502() {
    let synthesizer = MockSynthesizer::failing(SynthesisError::InvalidResponse {
        provider: "mock".to_string(),
        reason: "not json".to_string(),
    });
    let app = app_with(
        Arc::new(InMemoryRoadmapStore::new()),
        SynthesizerCapability::available(Arc::new(synthesizer)),
    );

    let (status, body) = app.get("/api/v1/roadmaps/Biology").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "SYNTHESIS_FAILED");
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_still_serves_generated_roadmap() {
    let app = app_with(
        Arc::new(FailingStore),
        SynthesizerCapability::available(Arc::new(MockSynthesizer::new(fixtures::curriculum(
            1, 1,
        )))),
    );

    let (status, body) = app.get("/api/v1/roadmaps/Biology").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from_cache"], false);
}

// ============================================================================
// STEP VIDEOS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_step_videos_for_given_topics() {
    let app = app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/roadmaps/Biology/steps/2/videos",
            Some(json!({ "topics": ["Cells", "Genetics"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step_number"], 2);
    let topics = body["topics"].as_array().cloned().unwrap_or_default();
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[0]["topic"], "Cells");
    assert_eq!(topics[1]["topic"], "Genetics");
}

#[tokio::test(start_paused = true)]
async fn test_step_videos_fall_back_to_cached_topics() {
    let app = app();
    app.get("/api/v1/roadmaps/Biology").await;

    let (status, body) = app
        .send(Method::POST, "/api/v1/roadmaps/Biology/steps/1/videos", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topics"][0]["topic"], "Topic 1.1");
}

#[tokio::test(start_paused = true)]
async fn test_step_videos_without_cached_roadmap_is_404() {
    let app = app();

    let (status, body) = app
        .send(Method::POST, "/api/v1/roadmaps/Biology/steps/1/videos", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ROADMAP_NOT_FOUND");
}

#[tokio::test(start_paused = true)]
async fn test_step_zero_is_rejected() {
    let app = app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/roadmaps/Biology/steps/0/videos",
            Some(json!({ "topics": ["Cells"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test(start_paused = true)]
async fn test_too_many_topics_is_rejected() {
    let app = app();
    let topics: Vec<String> = (0..21).map(|i| format!("Topic {}", i)).collect();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/roadmaps/Biology/steps/1/videos",
            Some(json!({ "topics": topics })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["topics"], 21);
}

#[tokio::test(start_paused = true)]
async fn test_non_numeric_step_is_invalid_input() {
    let app = app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/roadmaps/Biology/steps/first/videos",
            Some(json!({ "topics": ["Cells"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

// ============================================================================
// CACHE MAINTENANCE
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cache_stats_and_sweep() {
    let app = app();
    app.get("/api/v1/roadmaps/Biology").await;
    app.get("/api/v1/roadmaps/Chemistry").await;

    let (status, stats) = app.get("/api/v1/cache/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["active"], 2);
    assert_eq!(stats["ttl_seconds"], TTL.as_secs());

    app.clock.advance(chrono::Duration::seconds(TTL.as_secs() as i64 + 1));

    let (_, stats) = app.get("/api/v1/cache/stats").await;
    assert_eq!(stats["expired"], 2);

    let (status, body) = app
        .send(Method::POST, "/api/v1/cache/invalidate-expired", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);

    let (_, stats) = app.get("/api/v1/cache/stats").await;
    assert_eq!(stats["total"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_delete_entry() {
    let app = app();
    app.get("/api/v1/roadmaps/Biology").await;

    let (status, body) = app
        .send(Method::DELETE, "/api/v1/cache/entries/Biology", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, body) = app
        .send(Method::DELETE, "/api/v1/cache/entries/Biology", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_entry() {
    let app = app();

    let (status, body) = app
        .send(Method::POST, "/api/v1/cache/entries/Biology/refresh", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ROADMAP_NOT_FOUND");

    app.get("/api/v1/roadmaps/Biology").await;
    app.clock.advance(chrono::Duration::seconds(3000));

    let (status, body) = app
        .send(Method::POST, "/api/v1/cache/entries/Biology/refresh", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ttl_seconds"], TTL.as_secs());

    // Past the original expiry, still live after the refresh.
    app.clock.advance(chrono::Duration::seconds(1000));
    let (_, body) = app.get("/api/v1/roadmaps/Biology").await;
    assert_eq!(body["from_cache"], true);
}

#[tokio::test(start_paused = true)]
async fn test_clear_cache() {
    let app = app();
    app.get("/api/v1/roadmaps/Biology").await;
    app.get("/api/v1/roadmaps/Chemistry").await;

    let (status, body) = app.send(Method::DELETE, "/api/v1/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);

    let (_, body) = app.get("/api/v1/roadmaps/Biology").await;
    assert_eq!(body["from_cache"], false);
}

// ============================================================================
// HEALTH & OBSERVABILITY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_health_ping_and_live() {
    let app = app();

    let (status, body) = app.get("/health/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("pong".to_string()));

    let (status, body) = app.get("/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test(start_paused = true)]
async fn test_readiness_healthy() {
    let app = app();

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(
        body["details"]["components"].as_array().map(Vec::len),
        Some(3)
    );
}

#[tokio::test(start_paused = true)]
async fn test_readiness_degraded_without_synthesizer() {
    let app = app_with(Arc::new(InMemoryRoadmapStore::new()), SynthesizerCapability::Unavailable);

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test(start_paused = true)]
async fn test_readiness_unhealthy_when_store_down() {
    let app = app_with(Arc::new(FailingStore), SynthesizerCapability::Unavailable);

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test(start_paused = true)]
async fn test_metrics_endpoint() {
    let app = app();
    app.get("/api/v1/roadmaps/Biology").await;

    let (status, body) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap_or_default();
    assert!(text.contains("waypoint_http_requests_total"));
}

#[tokio::test(start_paused = true)]
async fn test_openapi_document_is_served() {
    let app = app();

    let (status, body) = app.get("/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Waypoint API");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_route_is_404() {
    let app = app();

    let (status, _) = app.get("/api/v1/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
