//! Roadmap orchestration.
//!
//! `CacheCheck -> HitReturn` or
//! `CacheCheck -> MissSynthesize -> Enrich -> CacheWrite -> Return`.
//!
//! Only validation and synthesis failures reach the caller. A store failure on
//! read is treated as a miss, a store failure on write is logged, and
//! enrichment never fails.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use waypoint_core::{
    normalize_program_name, PrerequisiteSkeleton, RoadmapPayload, RoadmapStep, StepVideos,
    StorageError, SynthesisError, TopicVideos, ValidationError, WaypointResult,
};
use waypoint_llm::SynthesizerCapability;
use waypoint_storage::{PrerequisiteResolver, RoadmapCache};

use crate::scheduler::{EnrichmentScheduler, EnrichmentSummary};

/// A roadmap and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RoadmapResponse {
    pub roadmap: RoadmapPayload,
    pub from_cache: bool,
    /// Present when the roadmap was enriched for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichmentSummary>,
}

impl RoadmapResponse {
    fn cached(roadmap: RoadmapPayload) -> Self {
        Self {
            roadmap,
            from_cache: true,
            enrichment: None,
        }
    }
}

/// Serves roadmaps from the cache, generating them on a miss.
pub struct RoadmapService {
    cache: Arc<RoadmapCache>,
    resolver: Arc<dyn PrerequisiteResolver>,
    synthesizer: SynthesizerCapability,
    scheduler: EnrichmentScheduler,
}

impl RoadmapService {
    pub fn new(
        cache: Arc<RoadmapCache>,
        resolver: Arc<dyn PrerequisiteResolver>,
        synthesizer: SynthesizerCapability,
        scheduler: EnrichmentScheduler,
    ) -> Self {
        Self {
            cache,
            resolver,
            synthesizer,
            scheduler,
        }
    }

    pub fn cache(&self) -> &Arc<RoadmapCache> {
        &self.cache
    }

    pub fn scheduler(&self) -> &EnrichmentScheduler {
        &self.scheduler
    }

    pub fn synthesizer(&self) -> &SynthesizerCapability {
        &self.synthesizer
    }

    /// Full roadmap for `program`, enriched with videos on a cache miss.
    pub async fn get_roadmap(&self, program: &str) -> WaypointResult<RoadmapResponse> {
        self.get_roadmap_with_cancel(program, &CancellationToken::new())
            .await
    }

    /// Like [`get_roadmap`](Self::get_roadmap), stopping enrichment early if
    /// `cancel` fires. Whatever was enriched by then is cached and returned.
    pub async fn get_roadmap_with_cancel(
        &self,
        program: &str,
        cancel: &CancellationToken,
    ) -> WaypointResult<RoadmapResponse> {
        let program = normalize_program_name(program)?;

        if let Some(roadmap) = self.cache_lookup(&program).await {
            return Ok(RoadmapResponse::cached(roadmap));
        }

        let mut roadmap = self.synthesize(&program).await?;
        let summary = self.scheduler.enrich_payload(&mut roadmap, cancel).await;

        match self.cache.put(&program, &roadmap).await {
            Ok(version) => tracing::info!(
                program = %program,
                version,
                steps = roadmap.steps.len(),
                topics_enriched = summary.topics_enriched,
                topics_total = summary.topics_total,
                "Roadmap generated and cached"
            ),
            Err(e) => tracing::warn!(
                program = %program,
                error = %e,
                "Failed to cache generated roadmap"
            ),
        }

        Ok(RoadmapResponse {
            roadmap,
            from_cache: false,
            enrichment: Some(summary),
        })
    }

    /// Roadmap without enrichment on a miss. Nothing is written to the cache.
    pub async fn get_roadmap_fast(&self, program: &str) -> WaypointResult<RoadmapResponse> {
        let program = normalize_program_name(program)?;

        if let Some(roadmap) = self.cache_lookup(&program).await {
            return Ok(RoadmapResponse::cached(roadmap));
        }

        let roadmap = self.synthesize(&program).await?;
        Ok(RoadmapResponse {
            roadmap,
            from_cache: false,
            enrichment: None,
        })
    }

    /// Enrich a single step.
    ///
    /// With no `topics`, the topics of that step in the cached roadmap are
    /// used, and the step must exist there.
    pub async fn get_step_videos(
        &self,
        program: &str,
        step_number: u32,
        topics: Vec<String>,
    ) -> WaypointResult<StepVideos> {
        let program = normalize_program_name(program)?;
        if step_number == 0 {
            return Err(ValidationError::InvalidValue {
                field: "step_number".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        let mut topics: Vec<String> = topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if topics.is_empty() {
            topics = self
                .cached_topics(&program, step_number)
                .await
                .ok_or_else(|| {
                    StorageError::not_found(format!("{} step {}", program, step_number))
                })?;
        }

        let report = self
            .scheduler
            .enrich(std::slice::from_ref(&topics), &CancellationToken::new())
            .await;
        let videos = report.step_videos(0);

        tracing::debug!(
            program = %program,
            step = step_number,
            topics_enriched = report.summary.topics_enriched,
            topics_total = report.summary.topics_total,
            "Step videos fetched"
        );

        Ok(StepVideos {
            program,
            step_number,
            topics: topics
                .into_iter()
                .zip(videos.into_iter().chain(std::iter::repeat_with(Vec::new)))
                .map(|(topic, videos)| TopicVideos { topic, videos })
                .collect(),
        })
    }

    async fn cache_lookup(&self, program: &str) -> Option<RoadmapPayload> {
        match self.cache.get(program).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    program = %program,
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Topics of a cached step, read without counting a cache hit or miss.
    async fn cached_topics(&self, program: &str, step_number: u32) -> Option<Vec<String>> {
        match self.cache.peek(program).await {
            Ok(found) => found?.step(step_number).map(|s| s.topics.clone()),
            Err(e) => {
                tracing::warn!(
                    program = %program,
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                None
            }
        }
    }

    async fn synthesize(&self, program: &str) -> WaypointResult<RoadmapPayload> {
        let synthesizer = self.synthesizer.synthesizer()?;

        let skeleton = match self.resolver.resolve_prerequisites(program).await {
            Ok(skeleton) => skeleton,
            Err(e) => {
                tracing::warn!(
                    program = %program,
                    error = %e,
                    "Prerequisite resolution failed, synthesizing without skeleton"
                );
                PrerequisiteSkeleton::empty(program)
            }
        };

        let curriculum = synthesizer.synthesize(program, &skeleton).await?;
        if curriculum.is_empty() {
            return Err(SynthesisError::Failed {
                program: program.to_string(),
                reason: "synthesizer returned an empty curriculum".to_string(),
            }
            .into());
        }

        let steps = curriculum
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                RoadmapStep::new(i as u32 + 1, step.title, step.description, step.topics)
            })
            .collect();
        Ok(RoadmapPayload::new(program, steps, self.cache.clock().now()))
    }
}

impl std::fmt::Debug for RoadmapService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoadmapService")
            .field("synthesizer", &self.synthesizer)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use waypoint_core::{CacheConfig, EnrichmentConfig, ManualClock, WaypointError};
    use waypoint_storage::{InMemoryPrerequisiteGraph, InMemoryRoadmapStore};
    use waypoint_test_utils::{fixtures, MockSynthesizer, MockVideoFetcher};

    fn service(synthesizer: SynthesizerCapability) -> RoadmapService {
        let cache = Arc::new(RoadmapCache::new(
            Arc::new(InMemoryRoadmapStore::new()),
            Arc::new(ManualClock::default()),
            CacheConfig::default().with_ttl(Duration::from_secs(3600)),
        ));
        let scheduler = EnrichmentScheduler::new(
            Arc::new(MockVideoFetcher::new()),
            EnrichmentConfig::default(),
        );
        RoadmapService::new(
            cache,
            Arc::new(InMemoryPrerequisiteGraph::new()),
            synthesizer,
            scheduler,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_program_is_rejected() {
        let svc = service(SynthesizerCapability::Unavailable);
        let err = svc.get_roadmap("   ").await.unwrap_err();
        assert!(matches!(err, WaypointError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_without_synthesizer_is_unavailable() {
        let svc = service(SynthesizerCapability::Unavailable);
        let err = svc.get_roadmap("Physics").await.unwrap_err();
        assert!(matches!(err, WaypointError::Synthesis(SynthesisError::Unavailable)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_zero_is_rejected() {
        let synth = Arc::new(MockSynthesizer::new(fixtures::curriculum(2, 2)));
        let svc = service(SynthesizerCapability::available(synth));
        let err = svc.get_step_videos("Physics", 0, Vec::new()).await.unwrap_err();
        assert!(matches!(err, WaypointError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_are_numbered_from_one() {
        let synth = Arc::new(MockSynthesizer::new(fixtures::curriculum(3, 1)));
        let svc = service(SynthesizerCapability::available(synth));
        let response = svc.get_roadmap_fast("Physics").await.unwrap();
        let numbers: Vec<u32> = response.roadmap.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(response.roadmap.is_unenriched());
    }
}
