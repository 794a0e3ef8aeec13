//! Waypoint API - REST Layer
//!
//! Axum routes over [`waypoint_pipeline::RoadmapService`]: roadmap lookup and
//! generation, per-step video enrichment, operator cache maintenance, health
//! checks and Prometheus metrics. A background job sweeps expired cache rows.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, CacheBackend};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
