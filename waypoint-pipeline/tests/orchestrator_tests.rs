//! Roadmap Orchestrator Tests
//!
//! End-to-end flows through [`RoadmapService`] with an in-memory store, a
//! manual cache clock, and mocked synthesis and video search.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use waypoint_core::{CacheConfig, EnrichmentConfig, ManualClock, SynthesisError};
use waypoint_llm::SynthesizerCapability;
use waypoint_pipeline::{EnrichmentScheduler, RoadmapService};
use waypoint_storage::{
    InMemoryPrerequisiteGraph, InMemoryRoadmapStore, PrerequisiteResolver, RoadmapCache,
    RoadmapStore,
};
use waypoint_test_utils::{
    assertions, fixtures, FailingResolver, FailingStore, MockSynthesizer, MockVideoFetcher,
    TopicBehavior,
};

// ============================================================================
// HARNESS
// ============================================================================

struct Harness {
    service: RoadmapService,
    clock: Arc<ManualClock>,
    store: Arc<InMemoryRoadmapStore>,
    synthesizer: Arc<MockSynthesizer>,
    fetcher: Arc<MockVideoFetcher>,
}

struct HarnessBuilder {
    store: Option<Arc<dyn RoadmapStore>>,
    resolver: Arc<dyn PrerequisiteResolver>,
    synthesizer: Arc<MockSynthesizer>,
    available: bool,
    fetcher: MockVideoFetcher,
    config: EnrichmentConfig,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            store: None,
            resolver: Arc::new(InMemoryPrerequisiteGraph::new()),
            synthesizer: Arc::new(MockSynthesizer::new(fixtures::curriculum(3, 2))),
            available: true,
            fetcher: MockVideoFetcher::new(),
            config: fixtures::enrichment_config(2, 2),
        }
    }

    fn store(mut self, store: Arc<dyn RoadmapStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn resolver(mut self, resolver: Arc<dyn PrerequisiteResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    fn synthesizer(mut self, synthesizer: MockSynthesizer) -> Self {
        self.synthesizer = Arc::new(synthesizer);
        self
    }

    fn without_synthesizer(mut self) -> Self {
        self.available = false;
        self
    }

    fn fetcher(mut self, fetcher: MockVideoFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let memory = Arc::new(InMemoryRoadmapStore::new());
        let store: Arc<dyn RoadmapStore> = match self.store {
            Some(store) => store,
            None => memory.clone(),
        };
        let cache = Arc::new(RoadmapCache::new(
            store,
            clock.clone(),
            fixtures::cache_config(Duration::from_secs(3600)),
        ));
        let fetcher = Arc::new(self.fetcher);
        let capability = if self.available {
            SynthesizerCapability::available(self.synthesizer.clone())
        } else {
            SynthesizerCapability::Unavailable
        };
        let service = RoadmapService::new(
            cache,
            self.resolver,
            capability,
            EnrichmentScheduler::new(fetcher.clone(), self.config),
        );

        Harness {
            service,
            clock,
            store: memory,
            synthesizer: self.synthesizer,
            fetcher,
        }
    }
}

// ============================================================================
// CACHE FLOW
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_miss_generates_then_hit_serves_cache() {
    let h = HarnessBuilder::new().build();

    let first = h.service.get_roadmap("Data Science").await.unwrap();
    assert!(!first.from_cache);
    let summary = first.enrichment.clone().unwrap();
    assert_eq!(summary.topics_total, 6);
    assert_eq!(summary.topics_enriched, 6);
    assertions::assert_aligned(&first.roadmap);

    let second = h.service.get_roadmap("Data Science").await.unwrap();
    assert!(second.from_cache);
    assert!(second.enrichment.is_none());
    assert_eq!(second.roadmap, first.roadmap);
    assert_eq!(h.synthesizer.calls(), 1);
    assert_eq!(h.fetcher.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_program_name_is_trimmed_but_case_sensitive() {
    let h = HarnessBuilder::new().build();

    h.service.get_roadmap("  Physics ").await.unwrap();
    assert!(h.store.entry("Physics").is_some());

    let other_case = h.service.get_roadmap("physics").await.unwrap();
    assert!(!other_case.from_cache);
    assert_eq!(h.synthesizer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let h = HarnessBuilder::new().build();
    let cache = h.service.cache();
    cache
        .put_with_ttl(
            "Data Science",
            &fixtures::payload("Data Science", 2, 2),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

    let hit = h.service.get_roadmap("Data Science").await.unwrap();
    assert!(hit.from_cache);

    h.clock.advance(ChronoDuration::hours(2));
    let miss = h.service.get_roadmap("Data Science").await.unwrap();
    assert!(!miss.from_cache);
    assert_eq!(h.synthesizer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hits_are_counted_in_background() {
    let h = HarnessBuilder::new().build();
    h.service.get_roadmap("Chemistry").await.unwrap();
    for _ in 0..3 {
        assert!(h.service.get_roadmap("Chemistry").await.unwrap().from_cache);
    }
    h.service.cache().flush_side_tasks().await;

    let entry = h.store.entry("Chemistry").unwrap();
    assert_eq!(entry.hit_count, 3);
    assert!(entry.last_accessed_at.is_some());

    let stats = h.service.cache().stats().await.unwrap();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.top_entries[0].key, "Chemistry");
}

// ============================================================================
// DEGRADED COLLABORATORS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_all_video_failures_still_return_and_cache_roadmap() {
    let h = HarnessBuilder::new()
        .fetcher(MockVideoFetcher::new().failing_all("quota exceeded"))
        .build();

    let response = h.service.get_roadmap("History").await.unwrap();
    assertions::assert_unenriched(&response.roadmap);
    assert_eq!(response.roadmap.steps.len(), 3);
    assert_eq!(response.enrichment.unwrap().topics_degraded, 6);
    assert!(h.store.entry("History").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_slow_topic_leaves_gap_in_place() {
    let h = HarnessBuilder::new()
        .fetcher(
            MockVideoFetcher::new()
                .with_topic("Topic 1.2", TopicBehavior::Delay(Duration::from_secs(30))),
        )
        .build();

    let response = h.service.get_roadmap("Biology").await.unwrap();
    let step = &response.roadmap.steps[0];
    assert!(!step.videos[0].is_empty());
    assert!(step.videos[1].is_empty());
    assert!(!response.roadmap.steps[1].videos[0].is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_degrades_to_uncached_generation() {
    let h = HarnessBuilder::new().store(Arc::new(FailingStore)).build();

    let first = h.service.get_roadmap("Economics").await.unwrap();
    let second = h.service.get_roadmap("Economics").await.unwrap();
    assert!(!first.from_cache);
    assert!(!second.from_cache);
    assert_eq!(h.synthesizer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_resolver_failure_synthesizes_without_skeleton() {
    let h = HarnessBuilder::new()
        .resolver(Arc::new(FailingResolver))
        .build();

    h.service.get_roadmap("Geology").await.unwrap();
    let skeleton = h.synthesizer.last_skeleton().unwrap();
    assert!(skeleton.is_empty());
    assert_eq!(skeleton.program, "Geology");
}

#[tokio::test(start_paused = true)]
async fn test_resolver_skeleton_reaches_synthesizer() {
    let graph = InMemoryPrerequisiteGraph::new()
        .with_prerequisite("Data Science", "Statistics")
        .with_prerequisite("Statistics", "Calculus");
    let h = HarnessBuilder::new().resolver(Arc::new(graph)).build();

    h.service.get_roadmap("Data Science").await.unwrap();
    let skeleton = h.synthesizer.last_skeleton().unwrap();
    assert_eq!(skeleton.course_count(), 2);
}

// ============================================================================
// SYNTHESIS ERRORS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unavailable_synthesizer_on_miss() {
    let h = HarnessBuilder::new().without_synthesizer().build();
    let result = h.service.get_roadmap("Physics").await;
    assertions::assert_synthesizer_unavailable(&result);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_synthesizer_still_serves_hits() {
    let h = HarnessBuilder::new().without_synthesizer().build();
    h.service
        .cache()
        .put("Physics", &fixtures::payload("Physics", 1, 1))
        .await
        .unwrap();

    let response = h.service.get_roadmap("Physics").await.unwrap();
    assert!(response.from_cache);
}

#[tokio::test(start_paused = true)]
async fn test_synthesis_failure_writes_nothing() {
    let h = HarnessBuilder::new()
        .synthesizer(MockSynthesizer::failing(SynthesisError::InvalidResponse {
            provider: "mock".to_string(),
            reason: "not json".to_string(),
        }))
        .build();

    let result = h.service.get_roadmap("Physics").await;
    assertions::assert_synthesis_failed(&result);
    assert!(h.store.is_empty());
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_curriculum_is_a_synthesis_failure() {
    let h = HarnessBuilder::new()
        .synthesizer(MockSynthesizer::new(Vec::new()))
        .build();

    let result = h.service.get_roadmap("Physics").await;
    assertions::assert_synthesis_failed(&result);
    assert!(h.store.is_empty());
}

// ============================================================================
// FAST VARIANT AND STEP VIDEOS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fast_miss_skips_enrichment_and_cache_write() {
    let h = HarnessBuilder::new().build();

    let response = h.service.get_roadmap_fast("Physics").await.unwrap();
    assert!(!response.from_cache);
    assert!(response.enrichment.is_none());
    assertions::assert_unenriched(&response.roadmap);
    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fast_hit_returns_enriched_roadmap() {
    let h = HarnessBuilder::new().build();
    h.service.get_roadmap("Physics").await.unwrap();

    let response = h.service.get_roadmap_fast("Physics").await.unwrap();
    assert!(response.from_cache);
    assert!(!response.roadmap.is_unenriched());
}

#[tokio::test(start_paused = true)]
async fn test_step_videos_for_explicit_topics() {
    let h = HarnessBuilder::new().build();

    let step = h
        .service
        .get_step_videos("Physics", 4, vec!["Optics".to_string(), " ".to_string()])
        .await
        .unwrap();

    assert_eq!(step.step_number, 4);
    assert_eq!(step.topics.len(), 1);
    assert_eq!(step.topics[0].topic, "Optics");
    assert_eq!(step.topics[0].videos[0].video_id, MockVideoFetcher::video_id("Optics", 0));
}

#[tokio::test(start_paused = true)]
async fn test_step_videos_default_to_cached_topics() {
    let h = HarnessBuilder::new().build();
    h.service
        .cache()
        .put("Physics", &fixtures::payload("Physics", 2, 3))
        .await
        .unwrap();

    let step = h.service.get_step_videos("Physics", 2, Vec::new()).await.unwrap();
    let topics: Vec<&str> = step.topics.iter().map(|t| t.topic.as_str()).collect();
    assert_eq!(topics, vec!["Topic 2.1", "Topic 2.2", "Topic 2.3"]);
    assert!(step.topics.iter().all(|t| !t.videos.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_step_videos_topic_lookup_is_not_a_cache_read() {
    let h = HarnessBuilder::new().build();
    h.service
        .cache()
        .put("Physics", &fixtures::payload("Physics", 2, 3))
        .await
        .unwrap();

    h.service.get_step_videos("Physics", 1, Vec::new()).await.unwrap();
    h.service.get_step_videos("Biology", 1, vec!["Cells".to_string()]).await.unwrap();
    assertions::assert_not_found(&h.service.get_step_videos("Biology", 1, Vec::new()).await);
    h.service.cache().flush_side_tasks().await;

    let stats = h.service.cache().stats().await.unwrap();
    assert_eq!((stats.hits, stats.misses), (0, 0));
    assert_eq!(h.store.entry("Physics").unwrap().hit_count, 0);
    assert!(h.store.entry("Physics").unwrap().last_accessed_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_step_videos_without_topics_or_cache_is_not_found() {
    let h = HarnessBuilder::new().build();
    let result = h.service.get_step_videos("Physics", 1, Vec::new()).await;
    assertions::assert_not_found(&result);

    h.service
        .cache()
        .put("Physics", &fixtures::payload("Physics", 2, 1))
        .await
        .unwrap();
    let result = h.service.get_step_videos("Physics", 9, Vec::new()).await;
    assertions::assert_not_found(&result);
}

#[test]
fn test_default_config_is_valid_for_service() {
    assert!(EnrichmentConfig::default().validate().is_ok());
    assert!(CacheConfig::default().validate().is_ok());
}
