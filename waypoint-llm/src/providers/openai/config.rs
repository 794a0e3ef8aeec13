//! OpenAI provider configuration

use std::time::Duration;

/// Settings for the OpenAI-compatible synthesizer.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub requests_per_minute: u32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            requests_per_minute: 60,
            timeout: Duration::from_secs(45),
        }
    }
}

impl OpenAiConfig {
    /// Read configuration from the environment.
    ///
    /// Returns `None` when `WAYPOINT_OPENAI_API_KEY` is unset or empty, which
    /// means synthesis is unavailable.
    ///
    /// Environment variables:
    /// - `WAYPOINT_OPENAI_API_KEY`: API key (required)
    /// - `WAYPOINT_OPENAI_MODEL`: Model name (default: gpt-4o-mini)
    /// - `WAYPOINT_OPENAI_BASE_URL`: API base URL (default: https://api.openai.com/v1)
    /// - `WAYPOINT_OPENAI_RPM`: Requests per minute (default: 60)
    /// - `WAYPOINT_OPENAI_TIMEOUT_SECS`: Request timeout (default: 45)
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("WAYPOINT_OPENAI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())?;
        let defaults = Self::default();

        Some(Self {
            api_key,
            model: std::env::var("WAYPOINT_OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("WAYPOINT_OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            requests_per_minute: std::env::var("WAYPOINT_OPENAI_RPM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.requests_per_minute),
            timeout: std::env::var("WAYPOINT_OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        })
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

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("requests_per_minute", &self.requests_per_minute)
            .field("timeout", &self.timeout)
            .finish()
    }
}
