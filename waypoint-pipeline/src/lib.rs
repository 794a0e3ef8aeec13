//! Waypoint Pipeline - Roadmap Generation
//!
//! Ties the cache, the prerequisite resolver, the curriculum synthesizer and
//! the video fetcher together:
//!
//! - [`RoadmapService`]: cache-first roadmap orchestration
//! - [`EnrichmentScheduler`]: bounded-concurrency, deadline-aware enrichment
//! - [`CacheMaintenance`]: statistics and housekeeping for operators

pub mod maintenance;
pub mod orchestrator;
pub mod scheduler;

pub use maintenance::CacheMaintenance;
pub use orchestrator::{RoadmapResponse, RoadmapService};
pub use scheduler::{ConcurrencyLimiter, EnrichmentReport, EnrichmentScheduler, EnrichmentSummary};
