//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use waypoint_pipeline::{CacheMaintenance, RoadmapService};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Roadmap generation and lookup.
    pub service: Arc<RoadmapService>,
    /// Operator cache housekeeping over the same cache as `service`.
    pub maintenance: CacheMaintenance,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<RoadmapService>) -> Self {
        let maintenance = CacheMaintenance::new(service.cache().clone());
        Self {
            service,
            maintenance,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<RoadmapService>, service);
crate::impl_from_ref!(CacheMaintenance, maintenance);
crate::impl_from_ref!(Instant, start_time);
