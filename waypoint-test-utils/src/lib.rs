//! Waypoint Test Utilities
//!
//! Shared test infrastructure for the Waypoint workspace:
//! - Mock video fetcher with latency, failure and in-flight instrumentation
//! - Mock curriculum synthesizer and failing store/resolver doubles
//! - Proptest generators for roadmap types
//! - Test fixtures for common scenarios
//! - Custom assertions for Waypoint-specific validation

pub use waypoint_core::{
    CacheConfig, CurriculumStep, EnrichmentConfig, ManualClock, PrerequisiteSkeleton,
    RoadmapEntry, RoadmapPayload, RoadmapStep, StorageError, StoreStats, SynthesisError,
    VideoReference, WaypointError, WaypointResult,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use waypoint_llm::CurriculumSynthesizer;
use waypoint_storage::{PrerequisiteResolver, RoadmapStore};
use waypoint_video::{DegradedReason, FetchOutcome, VideoFetcher};

// ============================================================================
// MOCK VIDEO FETCHER
// ============================================================================

/// How [`MockVideoFetcher`] answers for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicBehavior {
    /// Succeed after the fetcher's default latency.
    Succeed,
    /// Succeed after the given latency.
    Delay(Duration),
    /// Fail with a provider error after the default latency.
    Fail(String),
    /// Fail the first N calls, then succeed.
    FailTimes(u32),
    /// Never return, ignoring the call timeout.
    Hang,
}

/// Deterministic [`VideoFetcher`] for scheduler and orchestrator tests.
///
/// Honors the call timeout the way a real provider client does, except for
/// [`TopicBehavior::Hang`], and records peak concurrency.
#[derive(Debug)]
pub struct MockVideoFetcher {
    latency: Duration,
    videos_available: u32,
    default_behavior: TopicBehavior,
    behaviors: HashMap<String, TopicBehavior>,
    calls: AtomicUsize,
    calls_by_topic: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockVideoFetcher {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(10),
            videos_available: 3,
            default_behavior: TopicBehavior::Succeed,
            behaviors: HashMap::new(),
            calls: AtomicUsize::new(0),
            calls_by_topic: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_videos_available(mut self, count: u32) -> Self {
        self.videos_available = count;
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>, behavior: TopicBehavior) -> Self {
        self.behaviors.insert(topic.into(), behavior);
        self
    }

    /// Make every topic without its own behavior fail.
    pub fn failing_all(mut self, reason: impl Into<String>) -> Self {
        self.default_behavior = TopicBehavior::Fail(reason.into());
        self
    }

    /// The id of the `index`th video returned for `topic`.
    pub fn video_id(topic: &str, index: u32) -> String {
        let slug: String = topic
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("{}-{}", slug, index)
    }

    pub fn video(topic: &str, index: u32) -> VideoReference {
        let video_id = Self::video_id(topic, index);
        VideoReference {
            url: format!("https://www.youtube.com/watch?v={}", video_id),
            video_id,
            title: format!("{} explained, part {}", topic, index + 1),
            channel: "Mock Channel".to_string(),
            duration: Some("PT10M".to_string()),
            duration_seconds: Some(600),
            view_count: Some(1_000),
            thumbnail_url: None,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, topic: &str) -> u32 {
        self.calls_by_topic
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic)
            .copied()
            .unwrap_or(0)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent `fetch` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(
        &self,
        topic: &str,
        max_results: u32,
        latency: Duration,
        timeout: Duration,
    ) -> FetchOutcome {
        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return FetchOutcome::degraded(DegradedReason::Timeout);
        }
        tokio::time::sleep(latency).await;
        FetchOutcome::ok(
            (0..max_results.min(self.videos_available))
                .map(|i| Self::video(topic, i))
                .collect(),
        )
    }

    async fn fail(&self, reason: String, timeout: Duration) -> FetchOutcome {
        if self.latency > timeout {
            tokio::time::sleep(timeout).await;
            return FetchOutcome::degraded(DegradedReason::Timeout);
        }
        tokio::time::sleep(self.latency).await;
        FetchOutcome::degraded(DegradedReason::Provider(reason))
    }
}

impl Default for MockVideoFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even when the call is aborted.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize, max_in_flight: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VideoFetcher for MockVideoFetcher {
    async fn fetch(&self, topic: &str, max_results: u32, timeout: Duration) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut by_topic = self.calls_by_topic.lock().unwrap_or_else(|e| e.into_inner());
            let count = by_topic.entry(topic.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let _guard = InFlightGuard::enter(&self.in_flight, &self.max_in_flight);

        let behavior = self
            .behaviors
            .get(topic)
            .cloned()
            .unwrap_or_else(|| self.default_behavior.clone());

        match behavior {
            TopicBehavior::Succeed => self.respond(topic, max_results, self.latency, timeout).await,
            TopicBehavior::Delay(latency) => {
                self.respond(topic, max_results, latency, timeout).await
            }
            TopicBehavior::Fail(reason) => self.fail(reason, timeout).await,
            TopicBehavior::FailTimes(n) if attempt <= n => {
                self.fail("transient failure".to_string(), timeout).await
            }
            TopicBehavior::FailTimes(_) => {
                self.respond(topic, max_results, self.latency, timeout).await
            }
            TopicBehavior::Hang => std::future::pending::<FetchOutcome>().await,
        }
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// MOCK SYNTHESIZER
// ============================================================================

/// Curriculum synthesizer returning a fixed curriculum or error.
#[derive(Debug)]
pub struct MockSynthesizer {
    result: Result<Vec<CurriculumStep>, SynthesisError>,
    latency: Duration,
    calls: AtomicUsize,
    last_skeleton: Mutex<Option<PrerequisiteSkeleton>>,
}

impl MockSynthesizer {
    pub fn new(steps: Vec<CurriculumStep>) -> Self {
        Self::with_result(Ok(steps))
    }

    pub fn failing(error: SynthesisError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(result: Result<Vec<CurriculumStep>, SynthesisError>) -> Self {
        Self {
            result,
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_skeleton: Mutex::new(None),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The skeleton passed to the most recent call.
    pub fn last_skeleton(&self) -> Option<PrerequisiteSkeleton> {
        self.last_skeleton
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CurriculumSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        _program: &str,
        skeleton: &PrerequisiteSkeleton,
    ) -> Result<Vec<CurriculumStep>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_skeleton.lock().unwrap_or_else(|e| e.into_inner()) = Some(skeleton.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.result.clone()
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// FAILING DOUBLES
// ============================================================================

/// A [`RoadmapStore`] whose every operation fails as unavailable.
#[derive(Debug, Clone, Default)]
pub struct FailingStore;

impl FailingStore {
    fn offline<T>() -> Result<T, StorageError> {
        Err(StorageError::unavailable("store offline"))
    }
}

#[async_trait]
impl RoadmapStore for FailingStore {
    async fn get_live(
        &self,
        _key: &str,
        _now: DateTime<Utc>,
    ) -> Result<Option<RoadmapEntry>, StorageError> {
        Self::offline()
    }

    async fn upsert(
        &self,
        _key: &str,
        _payload: &RoadmapPayload,
        _now: DateTime<Utc>,
        _expires_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        Self::offline()
    }

    async fn record_access(&self, _key: &str, _at: DateTime<Utc>) -> Result<(), StorageError> {
        Self::offline()
    }

    async fn delete(&self, _key: &str) -> Result<bool, StorageError> {
        Self::offline()
    }

    async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, StorageError> {
        Self::offline()
    }

    async fn extend_ttl(
        &self,
        _key: &str,
        _now: DateTime<Utc>,
        _expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        Self::offline()
    }

    async fn clear(&self) -> Result<u64, StorageError> {
        Self::offline()
    }

    async fn stats(
        &self,
        _now: DateTime<Utc>,
        _top_limit: usize,
    ) -> Result<StoreStats, StorageError> {
        Self::offline()
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Self::offline()
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// A [`PrerequisiteResolver`] whose queries always fail.
#[derive(Debug, Clone, Default)]
pub struct FailingResolver;

#[async_trait]
impl PrerequisiteResolver for FailingResolver {
    async fn resolve_prerequisites(
        &self,
        _program: &str,
    ) -> Result<PrerequisiteSkeleton, StorageError> {
        Err(StorageError::GraphQueryFailed {
            reason: "graph offline".to_string(),
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for roadmap types.

    use super::*;
    use proptest::prelude::*;

    /// Program names such as "Data Science" or "Physics".
    pub fn arb_program_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,10}){0,2}"
    }

    pub fn arb_topic() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,12}( [a-z]{2,8}){0,2}"
    }

    pub fn arb_video_reference() -> impl Strategy<Value = VideoReference> {
        ("[A-Za-z0-9_-]{11}", arb_topic(), proptest::option::of(0u64..20_000)).prop_map(
            |(video_id, title, duration_seconds)| VideoReference {
                url: format!("https://www.youtube.com/watch?v={}", video_id),
                video_id,
                title,
                channel: "Channel".to_string(),
                duration: duration_seconds.map(|s| format!("PT{}S", s)),
                duration_seconds,
                view_count: None,
                thumbnail_url: None,
            },
        )
    }

    /// A step with 1-5 topics, each with 0-3 videos.
    pub fn arb_roadmap_step(step_number: u32) -> impl Strategy<Value = RoadmapStep> {
        (
            arb_topic(),
            prop::collection::vec(
                (arb_topic(), prop::collection::vec(arb_video_reference(), 0..=3)),
                1..=5,
            ),
        )
            .prop_map(move |(title, topics)| {
                let (names, videos): (Vec<_>, Vec<_>) = topics.into_iter().unzip();
                RoadmapStep::new(step_number, title, None, names).with_videos(videos)
            })
    }

    /// A payload with 1-4 consecutively numbered steps.
    pub fn arb_roadmap_payload() -> impl Strategy<Value = RoadmapPayload> {
        (arb_program_name(), 1usize..=4).prop_flat_map(|(program, step_count)| {
            let steps: Vec<_> = (1..=step_count as u32).map(arb_roadmap_step).collect();
            steps.prop_map(move |steps| RoadmapPayload::new(program.clone(), steps, Utc::now()))
        })
    }

    /// Valid enrichment settings with small caps.
    pub fn arb_enrichment_config() -> impl Strategy<Value = EnrichmentConfig> {
        (1usize..=4, 1usize..=4, 1u32..=5).prop_map(|(steps, topics, results)| EnrichmentConfig {
            max_concurrent_steps: steps,
            max_concurrent_topics: topics,
            max_results_per_topic: results,
            ..EnrichmentConfig::default()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Topic names laid out as `Topic {step}.{topic}`, both 1-based.
    pub fn topics(steps: usize, topics_per_step: usize) -> Vec<Vec<String>> {
        (1..=steps)
            .map(|s| (1..=topics_per_step).map(|t| format!("Topic {}.{}", s, t)).collect())
            .collect()
    }

    /// A synthesized curriculum matching [`topics`].
    pub fn curriculum(steps: usize, topics_per_step: usize) -> Vec<CurriculumStep> {
        topics(steps, topics_per_step)
            .into_iter()
            .enumerate()
            .map(|(i, topics)| CurriculumStep {
                title: format!("Step {}", i + 1),
                description: Some(format!("Everything needed for step {}", i + 1)),
                topics,
            })
            .collect()
    }

    /// An unenriched payload built from [`curriculum`].
    pub fn payload(program: &str, steps: usize, topics_per_step: usize) -> RoadmapPayload {
        let steps = curriculum(steps, topics_per_step)
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                RoadmapStep::new(i as u32 + 1, step.title, step.description, step.topics)
            })
            .collect();
        RoadmapPayload::new(program, steps, Utc::now())
    }

    /// Enrichment settings with short timeouts for paused-clock tests.
    pub fn enrichment_config(steps: usize, topics: usize) -> EnrichmentConfig {
        EnrichmentConfig {
            max_concurrent_steps: steps,
            max_concurrent_topics: topics,
            per_call_timeout: Duration::from_millis(500),
            per_step_timeout: Duration::from_secs(2),
            overall_timeout: Duration::from_secs(10),
            max_results_per_topic: 3,
            max_retries: 0,
            retry_backoff: Duration::from_millis(50),
        }
    }

    pub fn cache_config(ttl: Duration) -> CacheConfig {
        CacheConfig::default().with_ttl(ttl)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Waypoint-specific validation.

    use super::*;

    /// Assert that every step's video lists line up with its topics.
    #[track_caller]
    pub fn assert_aligned(payload: &RoadmapPayload) {
        for step in &payload.steps {
            assert_eq!(
                step.videos.len(),
                step.topics.len(),
                "step {} has {} topics but {} video lists",
                step.step_number,
                step.topics.len(),
                step.videos.len()
            );
        }
    }

    /// Assert that no topic in the payload has videos.
    #[track_caller]
    pub fn assert_unenriched(payload: &RoadmapPayload) {
        assert_aligned(payload);
        assert!(payload.is_unenriched(), "Expected no videos, got: {:?}", payload);
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &WaypointResult<T>) {
        match result {
            Err(WaypointError::Storage(StorageError::NotFound { .. })) => {}
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &WaypointResult<T>) {
        match result {
            Err(WaypointError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_synthesizer_unavailable<T: std::fmt::Debug>(result: &WaypointResult<T>) {
        match result {
            Err(WaypointError::Synthesis(SynthesisError::Unavailable)) => {}
            other => panic!("Expected SynthesizerUnavailable, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_synthesis_failed<T: std::fmt::Debug>(result: &WaypointResult<T>) {
        match result {
            Err(WaypointError::Synthesis(e)) if *e != SynthesisError::Unavailable => {}
            other => panic!("Expected synthesis failure, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_topic_fixture_layout() {
        let topics = fixtures::topics(2, 3);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[1][2], "Topic 2.3");
        assertions::assert_unenriched(&fixtures::payload("Physics", 2, 3));
    }

    #[test]
    fn test_video_id_is_slugged() {
        assert_eq!(MockVideoFetcher::video_id("Topic 1.2", 0), "topic-1-2-0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_fetcher_honors_timeout() {
        let fetcher = MockVideoFetcher::new().with_latency(Duration::from_secs(5));
        let outcome = fetcher.fetch("Slow", 3, Duration::from_secs(1)).await;
        assert_eq!(outcome.degraded, Some(DegradedReason::Timeout));
        assert_eq!(fetcher.in_flight(), 0);
        assert_eq!(fetcher.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_fetcher_fail_times_then_succeeds() {
        let fetcher = MockVideoFetcher::new().with_topic("Flaky", TopicBehavior::FailTimes(1));
        assert!(fetcher.fetch("Flaky", 2, Duration::from_secs(1)).await.is_degraded());
        let outcome = fetcher.fetch("Flaky", 2, Duration::from_secs(1)).await;
        assert_eq!(outcome.videos.len(), 2);
        assert_eq!(fetcher.calls_for("Flaky"), 2);
    }

    #[tokio::test]
    async fn test_failing_store_reports_unavailable() {
        let result = FailingStore.ping().await;
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_payload_is_aligned(payload in generators::arb_roadmap_payload()) {
            assertions::assert_aligned(&payload);
            let numbers: Vec<u32> = payload.steps.iter().map(|s| s.step_number).collect();
            let expected: Vec<u32> = (1..=payload.steps.len() as u32).collect();
            prop_assert_eq!(numbers, expected);
        }

        #[test]
        fn prop_generated_config_is_valid(config in generators::arb_enrichment_config()) {
            prop_assert!(config.validate().is_ok());
        }
    }
}
