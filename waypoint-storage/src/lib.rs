//! Waypoint Storage
//!
//! Persistence for cached roadmaps and prerequisite graphs:
//!
//! - [`RoadmapStore`]: raw row storage, implemented in memory and in PostgreSQL
//! - [`RoadmapCache`]: TTL, expiry and hit statistics on top of a store
//! - [`SideTaskPool`]: bounded background pool for best-effort statistics writes
//! - [`PrerequisiteResolver`]: layered prerequisite lookup for a program

pub mod cache;
pub mod graph;
pub mod memory;
pub mod postgres;
pub mod side_task;
pub mod store;

pub use cache::RoadmapCache;
pub use graph::{
    layer_prerequisites, InMemoryPrerequisiteGraph, PostgresPrerequisiteResolver,
    PrerequisiteResolver,
};
pub use memory::InMemoryRoadmapStore;
pub use postgres::{DbConfig, PostgresRoadmapStore};
pub use side_task::{
    log_observer, ErrorObserver, SideTaskError, SideTaskMetricsSnapshot, SideTaskPool,
};
pub use store::RoadmapStore;
