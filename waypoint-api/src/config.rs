//! API Configuration Module
//!
//! Server binding, CORS and cache backend selection. Configuration is loaded
//! from environment variables with sensible defaults for development.

use std::net::SocketAddr;
use std::str::FromStr;

use crate::constants::{DEFAULT_API_PORT, DEFAULT_BIND_HOST, DEFAULT_CORS_MAX_AGE_SECS};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// CACHE BACKEND
// ============================================================================

/// Where roadmap cache entries are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Shared PostgreSQL table; survives restarts.
    #[default]
    Postgres,
    /// Process-local map; for development and tests.
    Memory,
}

impl FromStr for CacheBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "in-memory" | "mem" => Ok(Self::Memory),
            other => Err(ApiError::configuration_error(format!(
                "Unknown cache backend '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Storage
    // ========================================================================
    pub cache_backend: CacheBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_API_PORT,
            cors_origins: Vec::new(), // Empty = allow all
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            cache_backend: CacheBackend::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `WAYPOINT_API_BIND`: Host to bind (default: 0.0.0.0)
    /// - `PORT` or `WAYPOINT_API_PORT`: Port (default: 3000)
    /// - `WAYPOINT_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `WAYPOINT_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `WAYPOINT_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `WAYPOINT_CACHE_BACKEND`: "postgres" or "memory" (default: postgres)
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let bind_host = std::env::var("WAYPOINT_API_BIND").unwrap_or(defaults.bind_host);

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("WAYPOINT_API_PORT").ok())
        {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                ApiError::configuration_error(format!("Invalid port value: {}", raw))
            })?,
            None => defaults.port,
        };

        let cors_origins = std::env::var("WAYPOINT_CORS_ORIGINS")
            .ok()
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("WAYPOINT_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("WAYPOINT_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        let cache_backend = match std::env::var("WAYPOINT_CACHE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.cache_backend,
        };

        Ok(Self {
            bind_host,
            port,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            cache_backend,
        })
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::configuration_error(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.example.edu matches any https subdomain
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
