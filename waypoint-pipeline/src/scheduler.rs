//! Bounded-concurrency video enrichment.
//!
//! A roadmap fans out twice: steps run under one limiter, and the topics of a
//! step run under a per-step limiter. Deadlines nest the same way:
//!
//! - the overall deadline bounds the whole run
//! - each step gets `min(overall, now + per_step_timeout)` once it starts
//! - each provider call gets `min(per_call_timeout, step remaining)`
//!
//! Each level owns a [`JoinSet`], so when a level stops waiting, dropping its
//! set aborts everything underneath. Results land in positional slots as they
//! complete, so partial results survive an overall timeout or cancellation.
//! Enrichment never fails: a topic without a result gets an empty list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use waypoint_core::{EnrichmentConfig, RoadmapPayload, VideoReference};
use waypoint_video::{DegradedReason, FetchOutcome, VideoFetcher};

// ============================================================================
// CONCURRENCY LIMITER
// ============================================================================

/// Semaphore wrapper whose acquisition gives up on cancellation.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a permit. Returns `None` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// Counters describing one enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EnrichmentSummary {
    pub steps_total: usize,
    pub topics_total: usize,
    /// Topics that received at least one video.
    pub topics_enriched: usize,
    /// Topics whose fetch settled with a timeout or provider failure.
    pub topics_degraded: usize,
    /// Topics still running or queued when the run stopped.
    pub topics_unsettled: usize,
    /// Steps cut short by their own deadline.
    pub steps_timed_out: usize,
    /// The overall deadline elapsed before every step settled.
    pub timed_out: bool,
    /// The caller cancelled the run.
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Per-topic results of one enrichment run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// `videos[step][topic]`, empty where enrichment did not succeed.
    pub videos: Vec<Vec<Vec<VideoReference>>>,
    /// `degraded[step][topic]`, set where enrichment did not succeed.
    pub degraded: Vec<Vec<Option<DegradedReason>>>,
    pub summary: EnrichmentSummary,
}

impl EnrichmentReport {
    /// Videos for one step, or an empty list if the index is out of range.
    pub fn step_videos(&self, step_index: usize) -> Vec<Vec<VideoReference>> {
        self.videos.get(step_index).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TopicSlot {
    Pending,
    Fetched(Vec<VideoReference>),
    Degraded(DegradedReason),
}

type Slots = Arc<Mutex<Vec<Vec<TopicSlot>>>>;

/// Settle a pending slot. Settled slots are never overwritten.
fn settle(slots: &Slots, step_index: usize, topic_index: usize, slot: TopicSlot) {
    let mut guard = slots.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(current) = guard
        .get_mut(step_index)
        .and_then(|topics| topics.get_mut(topic_index))
    {
        if *current == TopicSlot::Pending {
            *current = slot;
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

struct RunContext {
    fetcher: Arc<dyn VideoFetcher>,
    config: EnrichmentConfig,
    slots: Slots,
    overall_deadline: Instant,
    step_limiter: ConcurrencyLimiter,
    steps_timed_out: AtomicUsize,
}

/// Enriches roadmap topics with videos under concurrency and time limits.
#[derive(Clone)]
pub struct EnrichmentScheduler {
    fetcher: Arc<dyn VideoFetcher>,
    config: EnrichmentConfig,
}

impl EnrichmentScheduler {
    pub fn new(fetcher: Arc<dyn VideoFetcher>, config: EnrichmentConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &Arc<dyn VideoFetcher> {
        &self.fetcher
    }

    /// Enrich `steps`, each a list of topic names.
    ///
    /// Returns once every step settles, the overall deadline elapses, or
    /// `cancel` fires, whichever comes first. Never fails.
    pub async fn enrich(
        &self,
        steps: &[Vec<String>],
        cancel: &CancellationToken,
    ) -> EnrichmentReport {
        let started = Instant::now();
        let token = cancel.child_token();
        let slots: Slots = Arc::new(Mutex::new(
            steps
                .iter()
                .map(|topics| vec![TopicSlot::Pending; topics.len()])
                .collect(),
        ));
        let ctx = Arc::new(RunContext {
            fetcher: Arc::clone(&self.fetcher),
            config: self.config.clone(),
            slots: Arc::clone(&slots),
            overall_deadline: started + self.config.overall_timeout,
            step_limiter: ConcurrencyLimiter::new(self.config.max_concurrent_steps),
            steps_timed_out: AtomicUsize::new(0),
        });

        let mut step_tasks = JoinSet::new();
        for (step_index, topics) in steps.iter().enumerate() {
            if topics.is_empty() {
                continue;
            }
            step_tasks.spawn(run_step(
                Arc::clone(&ctx),
                step_index,
                topics.clone(),
                token.clone(),
            ));
        }

        let exit = await_settled(&mut step_tasks, &token, ctx.overall_deadline, "step").await;
        // Calls truncated by the deadline may settle at the same instant it fires.
        let timed_out = match exit {
            WaitExit::Deadline => true,
            WaitExit::Settled => Instant::now() >= ctx.overall_deadline,
            WaitExit::Cancelled => false,
        };

        // Snapshot before stopping the remaining work so the report is fixed.
        let snapshot = slots.lock().unwrap_or_else(|e| e.into_inner()).clone();
        token.cancel();
        // Every step drains its own topic tasks before returning, so once this
        // set is empty no fetch from this run is still in flight.
        while step_tasks.join_next().await.is_some() {}

        let cancelled = cancel.is_cancelled() && !timed_out;
        let report = build_report(
            snapshot,
            steps.len(),
            ctx.steps_timed_out.load(Ordering::Relaxed),
            timed_out,
            cancelled,
            started.elapsed().as_millis() as u64,
        );

        if timed_out {
            tracing::warn!(
                topics_total = report.summary.topics_total,
                topics_unsettled = report.summary.topics_unsettled,
                overall_timeout_ms = self.config.overall_timeout.as_millis() as u64,
                "Enrichment hit overall timeout, returning partial results"
            );
        } else {
            tracing::debug!(
                topics_total = report.summary.topics_total,
                topics_enriched = report.summary.topics_enriched,
                topics_degraded = report.summary.topics_degraded,
                cancelled,
                elapsed_ms = report.summary.elapsed_ms,
                "Enrichment finished"
            );
        }
        report
    }

    /// Enrich every step of `payload` in place.
    pub async fn enrich_payload(
        &self,
        payload: &mut RoadmapPayload,
        cancel: &CancellationToken,
    ) -> EnrichmentSummary {
        let topics: Vec<Vec<String>> = payload.steps.iter().map(|s| s.topics.clone()).collect();
        let report = self.enrich(&topics, cancel).await;

        for (step, mut videos) in payload.steps.iter_mut().zip(report.videos) {
            videos.resize_with(step.topics.len(), Vec::new);
            step.videos = videos;
        }
        report.summary
    }
}

impl std::fmt::Debug for EnrichmentScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentScheduler")
            .field("fetcher", &self.fetcher.provider_name())
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitExit {
    Settled,
    Cancelled,
    Deadline,
}

/// Join every task in `tasks` unless `token` fires or `deadline` passes first.
async fn await_settled(
    tasks: &mut JoinSet<()>,
    token: &CancellationToken,
    deadline: Instant,
    level: &'static str,
) -> WaitExit {
    loop {
        tokio::select! {
            biased;
            joined = tasks.join_next() => match joined {
                Some(Err(e)) if e.is_panic() => {
                    tracing::error!(level, error = %e, "Enrichment task panicked");
                }
                Some(_) => {}
                None => return WaitExit::Settled,
            },
            _ = token.cancelled() => return WaitExit::Cancelled,
            _ = tokio::time::sleep_until(deadline) => return WaitExit::Deadline,
        }
    }
}

async fn run_step(
    ctx: Arc<RunContext>,
    step_index: usize,
    topics: Vec<String>,
    token: CancellationToken,
) {
    let Some(_permit) = ctx.step_limiter.acquire(&token).await else {
        return;
    };

    let step_deadline = ctx
        .overall_deadline
        .min(Instant::now() + ctx.config.per_step_timeout);
    let step_token = token.child_token();
    let topic_limiter = ConcurrencyLimiter::new(ctx.config.max_concurrent_topics);

    let mut topic_tasks = JoinSet::new();
    for (topic_index, topic) in topics.into_iter().enumerate() {
        topic_tasks.spawn(run_topic(
            Arc::clone(&ctx),
            step_index,
            topic_index,
            topic,
            topic_limiter.clone(),
            step_deadline,
            step_token.clone(),
        ));
    }

    let exit = await_settled(&mut topic_tasks, &step_token, step_deadline, "topic").await;
    let hit_deadline = match exit {
        WaitExit::Deadline => true,
        WaitExit::Settled => Instant::now() >= step_deadline,
        WaitExit::Cancelled => false,
    };

    // Only the step's own deadline settles its topics; the overall deadline
    // leaves them unsettled for the caller to report.
    if hit_deadline && step_deadline < ctx.overall_deadline {
        let timed_out = {
            let mut slots = ctx.slots.lock().unwrap_or_else(|e| e.into_inner());
            let mut timed_out = false;
            if let Some(step_slots) = slots.get_mut(step_index) {
                for slot in step_slots.iter_mut() {
                    match slot {
                        TopicSlot::Pending => {
                            *slot = TopicSlot::Degraded(DegradedReason::Timeout);
                            timed_out = true;
                        }
                        TopicSlot::Degraded(DegradedReason::Timeout) => timed_out = true,
                        _ => {}
                    }
                }
            }
            timed_out
        };
        if timed_out {
            ctx.steps_timed_out.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                step = step_index + 1,
                per_step_timeout_ms = ctx.config.per_step_timeout.as_millis() as u64,
                "Enrichment step timed out"
            );
        }
    }
    step_token.cancel();
    // Dropping the set only schedules aborts; wait for them so the step permit
    // is not released while this step's fetches are still alive.
    topic_tasks.shutdown().await;
}

async fn run_topic(
    ctx: Arc<RunContext>,
    step_index: usize,
    topic_index: usize,
    topic: String,
    limiter: ConcurrencyLimiter,
    step_deadline: Instant,
    token: CancellationToken,
) {
    let Some(_permit) = limiter.acquire(&token).await else {
        return;
    };

    let mut attempt: u32 = 0;
    loop {
        let remaining = step_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            settle(
                &ctx.slots,
                step_index,
                topic_index,
                TopicSlot::Degraded(DegradedReason::Timeout),
            );
            return;
        }
        let call_timeout = ctx.config.per_call_timeout.min(remaining);

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = tokio::time::timeout(
                call_timeout,
                ctx.fetcher.fetch(&topic, ctx.config.max_results_per_topic, call_timeout),
            ) => result.unwrap_or_else(|_| FetchOutcome::degraded(DegradedReason::Timeout)),
        };

        let reason = match outcome.degraded {
            None => {
                settle(&ctx.slots, step_index, topic_index, TopicSlot::Fetched(outcome.videos));
                return;
            }
            Some(reason) => reason,
        };

        let resume_at = Instant::now() + ctx.config.retry_backoff;
        if attempt >= ctx.config.max_retries || resume_at >= step_deadline {
            tracing::debug!(
                step = step_index + 1,
                topic = %topic,
                reason = %reason,
                attempts = attempt + 1,
                "Topic enrichment degraded"
            );
            settle(&ctx.slots, step_index, topic_index, TopicSlot::Degraded(reason));
            return;
        }

        attempt += 1;
        tracing::debug!(topic = %topic, attempt, reason = %reason, "Retrying topic enrichment");
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep_until(resume_at) => {}
        }
    }
}

fn build_report(
    slots: Vec<Vec<TopicSlot>>,
    steps_total: usize,
    steps_timed_out: usize,
    timed_out: bool,
    cancelled: bool,
    elapsed_ms: u64,
) -> EnrichmentReport {
    let mut summary = EnrichmentSummary {
        steps_total,
        steps_timed_out,
        timed_out,
        cancelled,
        elapsed_ms,
        ..EnrichmentSummary::default()
    };
    let unsettled_reason = if cancelled {
        DegradedReason::Cancelled
    } else {
        DegradedReason::Timeout
    };

    let mut videos = Vec::with_capacity(slots.len());
    let mut degraded = Vec::with_capacity(slots.len());
    for step_slots in slots {
        let mut step_videos = Vec::with_capacity(step_slots.len());
        let mut step_degraded = Vec::with_capacity(step_slots.len());
        for slot in step_slots {
            summary.topics_total += 1;
            match slot {
                TopicSlot::Fetched(found) => {
                    if !found.is_empty() {
                        summary.topics_enriched += 1;
                    }
                    step_videos.push(found);
                    step_degraded.push(None);
                }
                TopicSlot::Degraded(reason) => {
                    summary.topics_degraded += 1;
                    step_videos.push(Vec::new());
                    step_degraded.push(Some(reason));
                }
                TopicSlot::Pending => {
                    summary.topics_unsettled += 1;
                    step_videos.push(Vec::new());
                    step_degraded.push(Some(unsettled_reason.clone()));
                }
            }
        }
        videos.push(step_videos);
        degraded.push(step_degraded);
    }

    EnrichmentReport {
        videos,
        degraded,
        summary,
    }
}
