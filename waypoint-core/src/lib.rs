//! Waypoint Core - Data Types
//!
//! Roadmap documents, cache entries, errors, configuration and the clock
//! abstraction. All other crates depend on this one; it holds no I/O.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod roadmap;

pub use cache::{
    hit_rate, top_entry_order, CacheStats, RoadmapEntry, StoreStats, TopEntry, TOP_ENTRIES_LIMIT,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, EnrichmentConfig};
pub use error::{
    ConfigError, StorageError, SynthesisError, ValidationError, WaypointError, WaypointResult,
};
pub use health::{HealthCheck, HealthStatus};
pub use roadmap::{
    CurriculumStep, PrerequisiteSkeleton, RoadmapPayload, RoadmapStep, StepVideos, TopicVideos,
    VideoReference,
};

/// Normalize a program name used as a cache key.
///
/// Surrounding whitespace is removed; case is preserved because keys are
/// matched exactly.
pub fn normalize_program_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "program".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
