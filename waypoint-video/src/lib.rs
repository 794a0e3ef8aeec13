//! Waypoint Video - Topic Enrichment
//!
//! A [`VideoFetcher`] finds a handful of illustrative videos for one topic.
//! Fetching is best-effort: a timeout or provider failure yields an empty
//! list with a [`DegradedReason`], never an error.

pub mod duration;
pub mod youtube;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use waypoint_core::VideoReference;

pub use duration::parse_iso8601_duration;
pub use youtube::{YouTubeConfig, YouTubeFetcher};

/// Why a topic came back without videos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradedReason {
    /// The call did not finish within its deadline.
    Timeout,
    /// The provider rejected the request or returned garbage.
    Provider(String),
    /// Enrichment was cancelled before the call finished.
    Cancelled,
}

impl std::fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Provider(reason) => write!(f, "provider error: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of one topic fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub videos: Vec<VideoReference>,
    pub degraded: Option<DegradedReason>,
}

impl FetchOutcome {
    pub fn ok(videos: Vec<VideoReference>) -> Self {
        Self {
            videos,
            degraded: None,
        }
    }

    pub fn degraded(reason: DegradedReason) -> Self {
        Self {
            videos: Vec::new(),
            degraded: Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Finds videos for a topic.
///
/// Implementations make at most one provider attempt per call and must return
/// within `timeout`.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    async fn fetch(&self, topic: &str, max_results: u32, timeout: Duration) -> FetchOutcome;

    /// Provider name for logs and health output.
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_outcome_is_empty() {
        let outcome = FetchOutcome::degraded(DegradedReason::Timeout);
        assert!(outcome.videos.is_empty());
        assert!(outcome.is_degraded());
        assert!(!FetchOutcome::ok(Vec::new()).is_degraded());
    }

    #[test]
    fn test_degraded_reason_display() {
        assert_eq!(DegradedReason::Timeout.to_string(), "timeout");
        assert_eq!(
            DegradedReason::Provider("quota exceeded".to_string()).to_string(),
            "provider error: quota exceeded"
        );
    }
}
