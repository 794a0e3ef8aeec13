//! Configuration types for the roadmap cache and the enrichment scheduler.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, WaypointError, WaypointResult};

// ============================================================================
// CACHE CONFIG
// ============================================================================

/// Longest accepted entry lifetime (ten years).
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(10 * 365 * 86_400);

/// Roadmap cache policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a written entry.
    pub ttl: Duration,
    /// Workers draining best-effort side tasks (access statistics).
    pub side_task_workers: usize,
    /// Pending side tasks accepted before new ones are dropped.
    pub side_task_queue: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(86_400),
            side_task_workers: 2,
            side_task_queue: 1024,
        }
    }
}

impl CacheConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `WAYPOINT_CACHE_TTL_SECS`: Entry lifetime in seconds (default: 86400)
    /// - `WAYPOINT_SIDE_TASK_WORKERS`: Statistics workers (default: 2)
    /// - `WAYPOINT_SIDE_TASK_QUEUE`: Statistics queue capacity (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            ttl: std::env::var("WAYPOINT_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
            side_task_workers: std::env::var("WAYPOINT_SIDE_TASK_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.side_task_workers),
            side_task_queue: std::env::var("WAYPOINT_SIDE_TASK_QUEUE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.side_task_queue),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> WaypointResult<()> {
        if self.ttl.is_zero() {
            return Err(invalid("ttl", format!("{:?}", self.ttl), "ttl must be positive"));
        }
        if self.ttl > MAX_CACHE_TTL {
            return Err(invalid(
                "ttl",
                format!("{:?}", self.ttl),
                &format!("ttl must not exceed {:?}", MAX_CACHE_TTL),
            ));
        }
        if self.side_task_workers == 0 {
            return Err(invalid(
                "side_task_workers",
                self.side_task_workers.to_string(),
                "at least one worker is required",
            ));
        }
        if self.side_task_queue == 0 {
            return Err(invalid(
                "side_task_queue",
                self.side_task_queue.to_string(),
                "side_task_queue must be greater than 0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// ENRICHMENT CONFIG
// ============================================================================

/// Limits for the per-roadmap video enrichment fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Steps enriched at the same time.
    pub max_concurrent_steps: usize,
    /// Topic fetches in flight per step.
    pub max_concurrent_topics: usize,
    /// Upper bound for a single provider call.
    pub per_call_timeout: Duration,
    /// Upper bound for all topic fetches of one step.
    pub per_step_timeout: Duration,
    /// Upper bound for the whole roadmap.
    pub overall_timeout: Duration,
    pub max_results_per_topic: u32,
    /// Extra attempts after a degraded fetch. Zero disables retries.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrent_steps: 3,
            max_concurrent_topics: 3,
            per_call_timeout: Duration::from_millis(8_000),
            per_step_timeout: Duration::from_millis(20_000),
            overall_timeout: Duration::from_millis(60_000),
            max_results_per_topic: 3,
            max_retries: 0,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl EnrichmentConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `WAYPOINT_MAX_CONCURRENT_STEPS` (default: 3)
    /// - `WAYPOINT_MAX_CONCURRENT_TOPICS` (default: 3)
    /// - `WAYPOINT_PER_CALL_TIMEOUT_MS` (default: 8000)
    /// - `WAYPOINT_PER_STEP_TIMEOUT_MS` (default: 20000)
    /// - `WAYPOINT_OVERALL_TIMEOUT_MS` (default: 60000)
    /// - `WAYPOINT_VIDEOS_PER_TOPIC` (default: 3)
    /// - `WAYPOINT_ENRICH_MAX_RETRIES` (default: 0)
    /// - `WAYPOINT_ENRICH_RETRY_BACKOFF_MS` (default: 250)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |name: &str, fallback: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        Self {
            max_concurrent_steps: std::env::var("WAYPOINT_MAX_CONCURRENT_STEPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_steps),
            max_concurrent_topics: std::env::var("WAYPOINT_MAX_CONCURRENT_TOPICS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_topics),
            per_call_timeout: millis("WAYPOINT_PER_CALL_TIMEOUT_MS", defaults.per_call_timeout),
            per_step_timeout: millis("WAYPOINT_PER_STEP_TIMEOUT_MS", defaults.per_step_timeout),
            overall_timeout: millis("WAYPOINT_OVERALL_TIMEOUT_MS", defaults.overall_timeout),
            max_results_per_topic: std::env::var("WAYPOINT_VIDEOS_PER_TOPIC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_results_per_topic),
            max_retries: std::env::var("WAYPOINT_ENRICH_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: millis("WAYPOINT_ENRICH_RETRY_BACKOFF_MS", defaults.retry_backoff),
        }
    }

    /// Validate the configuration.
    ///
    /// Both concurrency caps and all timeouts must be positive, and
    /// `max_results_per_topic` must be within the provider's page size (1..=50).
    pub fn validate(&self) -> WaypointResult<()> {
        if self.max_concurrent_steps == 0 {
            return Err(invalid(
                "max_concurrent_steps",
                self.max_concurrent_steps.to_string(),
                "max_concurrent_steps must be greater than 0",
            ));
        }
        if self.max_concurrent_topics == 0 {
            return Err(invalid(
                "max_concurrent_topics",
                self.max_concurrent_topics.to_string(),
                "max_concurrent_topics must be greater than 0",
            ));
        }
        for (field, value) in [
            ("per_call_timeout", self.per_call_timeout),
            ("per_step_timeout", self.per_step_timeout),
            ("overall_timeout", self.overall_timeout),
        ] {
            if value.is_zero() {
                return Err(invalid(
                    field,
                    format!("{:?}", value),
                    &format!("{} must be positive", field),
                ));
            }
        }
        if !(1..=50).contains(&self.max_results_per_topic) {
            return Err(invalid(
                "max_results_per_topic",
                self.max_results_per_topic.to_string(),
                "max_results_per_topic must be between 1 and 50",
            ));
        }
        Ok(())
    }

    /// Largest number of provider calls that can be in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_concurrent_steps * self.max_concurrent_topics
    }
}

fn invalid(field: &str, value: String, reason: &str) -> WaypointError {
    WaypointError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
