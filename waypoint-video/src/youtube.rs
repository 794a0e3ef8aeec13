//! YouTube Data API v3 video fetcher.
//!
//! A topic lookup is a `search.list` call followed by a `videos.list` call for
//! durations and view counts. The details call is optional: if it fails the
//! search results are returned without them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use waypoint_core::VideoReference;

use crate::duration::parse_iso8601_duration;
use crate::{DegradedReason, FetchOutcome, VideoFetcher};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// YouTube fetcher settings, including HTTP connection pooling.
#[derive(Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
    pub base_url: String,
    /// Upper bound for a single HTTP request.
    pub request_timeout: Duration,
    /// Idle keep-alive connections kept per host.
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub gzip: bool,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            request_timeout: Duration::from_millis(8_000),
            pool_max_idle_per_host: 16,
            pool_idle_timeout: Duration::from_secs(90),
            gzip: true,
        }
    }
}

impl YouTubeConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `WAYPOINT_YOUTUBE_API_KEY`: API key (default: empty, every fetch degrades)
    /// - `WAYPOINT_YOUTUBE_BASE_URL`: API base URL
    /// - `WAYPOINT_VIDEO_TIMEOUT_MS`: HTTP request timeout (default: 8000)
    /// - `WAYPOINT_VIDEO_POOL_SIZE`: Idle connections per host (default: 16)
    /// - `WAYPOINT_VIDEO_IDLE_TIMEOUT_SECS`: Idle connection lifetime (default: 90)
    /// - `WAYPOINT_VIDEO_GZIP`: Request gzip responses (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_key: std::env::var("WAYPOINT_YOUTUBE_API_KEY").unwrap_or_default(),
            base_url: std::env::var("WAYPOINT_YOUTUBE_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            request_timeout: std::env::var("WAYPOINT_VIDEO_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            pool_max_idle_per_host: std::env::var("WAYPOINT_VIDEO_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_max_idle_per_host),
            pool_idle_timeout: std::env::var("WAYPOINT_VIDEO_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.pool_idle_timeout),
            gzip: std::env::var("WAYPOINT_VIDEO_GZIP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.gzip),
        }
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Build the shared HTTP client described by this configuration.
    pub fn build_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(self.request_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .gzip(self.gzip)
            .build()
    }
}

impl std::fmt::Debug for YouTubeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("gzip", &self.gzip)
            .finish()
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    /// The API encodes counts as decimal strings.
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// ============================================================================
// FETCHER
// ============================================================================

/// [`VideoFetcher`] over the YouTube Data API.
#[derive(Clone)]
pub struct YouTubeFetcher {
    client: Client,
    config: YouTubeConfig,
}

impl YouTubeFetcher {
    pub fn new(config: YouTubeConfig) -> Result<Self, reqwest::Error> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }

    /// Use an existing client, sharing its connection pool.
    pub fn with_client(client: Client, config: YouTubeConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &YouTubeConfig {
        &self.config
    }

    async fn search(
        &self,
        topic: &str,
        max_results: u32,
    ) -> Result<Vec<VideoReference>, DegradedReason> {
        let max_results = max_results.clamp(1, 50).to_string();
        let response = self
            .client
            .get(format!("{}/search", self.config.base_url))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("safeSearch", "strict"),
                ("maxResults", max_results.as_str()),
                ("q", topic),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_failure("search request failed", e))?;

        let body: SearchResponse = decode(response).await?;
        let mut videos: Vec<VideoReference> = body
            .items
            .into_iter()
            .filter_map(search_item_to_reference)
            .collect();

        if videos.is_empty() {
            return Ok(videos);
        }

        match self.details(&videos).await {
            Ok(details) => {
                for video in &mut videos {
                    if let Some(item) = details.get(&video.video_id) {
                        apply_details(video, item);
                    }
                }
            }
            Err(reason) => {
                tracing::debug!(topic = %topic, reason = %reason, "Video details unavailable");
            }
        }
        Ok(videos)
    }

    async fn details(
        &self,
        videos: &[VideoReference],
    ) -> Result<HashMap<String, VideoItem>, DegradedReason> {
        let ids = videos
            .iter()
            .map(|v| v.video_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .client
            .get(format!("{}/videos", self.config.base_url))
            .query(&[
                ("part", "contentDetails,statistics"),
                ("id", ids.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_failure("videos request failed", e))?;

        let body: VideosResponse = decode(response).await?;
        Ok(body.items.into_iter().map(|item| (item.id.clone(), item)).collect())
    }
}

impl std::fmt::Debug for YouTubeFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeFetcher")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl VideoFetcher for YouTubeFetcher {
    async fn fetch(&self, topic: &str, max_results: u32, timeout: Duration) -> FetchOutcome {
        let topic = topic.trim();
        if topic.is_empty() {
            return FetchOutcome::ok(Vec::new());
        }
        if !self.config.has_api_key() {
            return FetchOutcome::degraded(DegradedReason::Provider(
                "no YouTube API key configured".to_string(),
            ));
        }

        let reason = match tokio::time::timeout(timeout, self.search(topic, max_results)).await {
            Ok(Ok(videos)) => return FetchOutcome::ok(videos),
            Ok(Err(reason)) => reason,
            Err(_) => DegradedReason::Timeout,
        };

        if reason == DegradedReason::Timeout {
            tracing::warn!(
                topic = %topic,
                timeout_ms = timeout.as_millis() as u64,
                "Video search timed out"
            );
        } else {
            tracing::warn!(topic = %topic, reason = %reason, "Video search failed");
        }
        FetchOutcome::degraded(reason)
    }

    fn provider_name(&self) -> &str {
        "youtube"
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Classify a transport error; the client's request timeout maps to
/// [`DegradedReason::Timeout`].
fn request_failure(context: &str, error: reqwest::Error) -> DegradedReason {
    if error.is_timeout() {
        DegradedReason::Timeout
    } else {
        DegradedReason::Provider(format!("{}: {}", context, error))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DegradedReason> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| request_failure("failed to read response body", e))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);
        return Err(DegradedReason::Provider(format!(
            "HTTP {}: {}",
            status.as_u16(),
            message
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| DegradedReason::Provider(format!("malformed response: {}", e)))
}

fn search_item_to_reference(item: SearchItem) -> Option<VideoReference> {
    let video_id = item.id.video_id.filter(|id| !id.is_empty())?;
    let snippet = item.snippet?;
    let thumbnail_url = ["high", "medium", "default"]
        .iter()
        .find_map(|size| snippet.thumbnails.get(*size))
        .map(|t| t.url.clone());

    Some(VideoReference {
        url: format!("https://www.youtube.com/watch?v={}", video_id),
        video_id,
        title: decode_html_entities(&snippet.title),
        channel: decode_html_entities(&snippet.channel_title),
        duration: None,
        duration_seconds: None,
        view_count: None,
        thumbnail_url,
    })
}

fn apply_details(video: &mut VideoReference, item: &VideoItem) {
    if let Some(duration) = item.content_details.as_ref().and_then(|d| d.duration.clone()) {
        video.duration_seconds = parse_iso8601_duration(&duration);
        video.duration = Some(duration);
    }
    video.view_count = item
        .statistics
        .as_ref()
        .and_then(|s| s.view_count.as_deref())
        .and_then(|v| v.parse().ok());
}

/// The search API HTML-escapes snippet text.
fn decode_html_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_BODY: &str = r#"{
        "items": [
            {
                "id": {"kind": "youtube#video", "videoId": "abc123"},
                "snippet": {
                    "title": "Linear Algebra &amp; You",
                    "channelTitle": "3Blue1Brown",
                    "thumbnails": {
                        "default": {"url": "https://i.ytimg.com/vi/abc123/default.jpg"},
                        "high": {"url": "https://i.ytimg.com/vi/abc123/hqdefault.jpg"}
                    }
                }
            },
            {
                "id": {"kind": "youtube#channel", "channelId": "UC123"},
                "snippet": {"title": "A channel", "channelTitle": "x", "thumbnails": {}}
            }
        ]
    }"#;

    const VIDEOS_BODY: &str = r#"{
        "items": [
            {
                "id": "abc123",
                "contentDetails": {"duration": "PT9M57S"},
                "statistics": {"viewCount": "1234567"}
            }
        ]
    }"#;

    #[test]
    fn test_search_items_become_references() {
        let body: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let videos: Vec<_> = body
            .items
            .into_iter()
            .filter_map(search_item_to_reference)
            .collect();

        assert_eq!(videos.len(), 1);
        let video = &videos[0];
        assert_eq!(video.video_id, "abc123");
        assert_eq!(video.title, "Linear Algebra & You");
        assert_eq!(video.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(
            video.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/abc123/hqdefault.jpg")
        );
    }

    #[test]
    fn test_details_fill_duration_and_views() {
        let body: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let mut video = body
            .items
            .into_iter()
            .find_map(search_item_to_reference)
            .unwrap();
        let details: VideosResponse = serde_json::from_str(VIDEOS_BODY).unwrap();

        apply_details(&mut video, &details.items[0]);

        assert_eq!(video.duration.as_deref(), Some("PT9M57S"));
        assert_eq!(video.duration_seconds, Some(597));
        assert_eq!(video.view_count, Some(1_234_567));
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(
            decode_html_entities("Rock &amp; Roll &#39;101&#39; &lt;live&gt;"),
            "Rock & Roll '101' <live>"
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_degrades_without_network() {
        let fetcher = YouTubeFetcher::new(YouTubeConfig::default()).unwrap();
        let outcome = fetcher
            .fetch("Statistics", 3, Duration::from_secs(1))
            .await;
        assert!(outcome.videos.is_empty());
        assert!(matches!(outcome.degraded, Some(DegradedReason::Provider(_))));
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let config = YouTubeConfig::new("test-key").with_base_url("http://127.0.0.1:9");
        let fetcher = YouTubeFetcher::new(config).unwrap();
        let outcome = fetcher
            .fetch("Statistics", 3, Duration::from_secs(5))
            .await;
        assert!(outcome.videos.is_empty());
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn test_client_request_timeout_degrades_as_timeout() {
        // Accepted by the kernel backlog but never answered.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config =
            YouTubeConfig::new("test-key").with_base_url(format!("http://{}", addr));
        config.request_timeout = Duration::from_millis(50);
        let fetcher = YouTubeFetcher::new(config).unwrap();

        let outcome = fetcher
            .fetch("Statistics", 3, Duration::from_secs(5))
            .await;

        assert!(outcome.videos.is_empty());
        assert_eq!(outcome.degraded, Some(DegradedReason::Timeout));
        drop(listener);
    }

    #[tokio::test]
    async fn test_blank_topic_is_not_fetched() {
        let fetcher = YouTubeFetcher::new(YouTubeConfig::new("test-key")).unwrap();
        let outcome = fetcher.fetch("   ", 3, Duration::from_secs(1)).await;
        assert_eq!(outcome, FetchOutcome::ok(Vec::new()));
    }
}
