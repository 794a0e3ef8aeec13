//! Waypoint API Server Entry Point
//!
//! Bootstraps configuration, wires the cache, resolver, synthesizer and video
//! fetcher into a roadmap service, and starts the Axum HTTP server.

use std::sync::Arc;

use tokio::sync::watch;
use waypoint_api::jobs::{expiry_sweep_task, ExpirySweepConfig};
use waypoint_api::telemetry::{init_tracing, side_task_observer, TelemetryConfig};
use waypoint_api::{create_router, ApiConfig, ApiError, ApiResult, AppState, CacheBackend};
use waypoint_core::{CacheConfig, EnrichmentConfig, SystemClock};
use waypoint_llm::{OpenAiConfig, OpenAiSynthesizer, SynthesizerCapability};
use waypoint_pipeline::{EnrichmentScheduler, RoadmapService};
use waypoint_storage::{
    DbConfig, InMemoryPrerequisiteGraph, InMemoryRoadmapStore, PostgresPrerequisiteResolver,
    PostgresRoadmapStore, PrerequisiteResolver, RoadmapCache, RoadmapStore,
};
use waypoint_video::{YouTubeConfig, YouTubeFetcher};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let api_config = ApiConfig::from_env()?;

    let cache_config = CacheConfig::from_env();
    cache_config.validate()?;
    let enrichment_config = EnrichmentConfig::from_env();
    enrichment_config.validate()?;

    let (store, resolver) = build_backends(api_config.cache_backend).await?;
    tracing::info!(backend = store.backend_name(), "Cache store ready");

    let cache = Arc::new(RoadmapCache::with_observer(
        store,
        Arc::new(SystemClock),
        cache_config,
        side_task_observer(),
    ));

    let synthesizer = build_synthesizer();

    let fetcher = YouTubeFetcher::new(YouTubeConfig::from_env()).map_err(|e| {
        ApiError::internal_error(format!("Failed to build video fetcher: {}", e))
    })?;
    let scheduler = EnrichmentScheduler::new(Arc::new(fetcher), enrichment_config);

    let service = Arc::new(RoadmapService::new(cache, resolver, synthesizer, scheduler));
    let state = AppState::new(service);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(expiry_sweep_task(
        state.maintenance.clone(),
        ExpirySweepConfig::from_env(),
        shutdown_rx,
    ));

    let app = create_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting Waypoint API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Expiry sweep task did not stop cleanly");
    }

    Ok(())
}

async fn build_backends(
    backend: CacheBackend,
) -> ApiResult<(Arc<dyn RoadmapStore>, Arc<dyn PrerequisiteResolver>)> {
    match backend {
        CacheBackend::Postgres => {
            let pool = DbConfig::from_env().create_pool()?;

            let store = PostgresRoadmapStore::new(pool.clone());
            store.ensure_schema().await?;

            let resolver = PostgresPrerequisiteResolver::new(pool);
            resolver.ensure_schema().await?;

            Ok((Arc::new(store), Arc::new(resolver)))
        }
        CacheBackend::Memory => {
            tracing::warn!("Using in-memory cache; roadmaps are lost on restart");
            Ok((
                Arc::new(InMemoryRoadmapStore::new()),
                Arc::new(InMemoryPrerequisiteGraph::new()),
            ))
        }
    }
}

fn build_synthesizer() -> SynthesizerCapability {
    let Some(config) = OpenAiConfig::from_env() else {
        tracing::warn!("WAYPOINT_OPENAI_API_KEY not set; only cached roadmaps can be served");
        return SynthesizerCapability::Unavailable;
    };

    match OpenAiSynthesizer::new(&config) {
        Ok(synthesizer) => SynthesizerCapability::available(Arc::new(synthesizer)),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to build synthesizer; only cached roadmaps can be served"
            );
            SynthesizerCapability::Unavailable
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
