//! Operator-facing cache maintenance.

use std::sync::Arc;

use waypoint_core::{normalize_program_name, CacheStats, WaypointResult};
use waypoint_storage::RoadmapCache;

/// Statistics and housekeeping over a shared [`RoadmapCache`].
#[derive(Clone)]
pub struct CacheMaintenance {
    cache: Arc<RoadmapCache>,
}

impl CacheMaintenance {
    pub fn new(cache: Arc<RoadmapCache>) -> Self {
        Self { cache }
    }

    pub async fn stats(&self) -> WaypointResult<CacheStats> {
        Ok(self.cache.stats().await?)
    }

    /// Remove every entry whose expiry has passed. Returns the number removed.
    pub async fn invalidate_expired(&self) -> WaypointResult<u64> {
        let removed = self.cache.invalidate_expired().await?;
        if removed > 0 {
            tracing::info!(removed, "Expired roadmap entries removed");
        }
        Ok(removed)
    }

    /// Delete one entry. Deleting a missing entry is not an error.
    pub async fn delete(&self, program: &str) -> WaypointResult<bool> {
        let program = normalize_program_name(program)?;
        Ok(self.cache.delete(&program).await?)
    }

    /// Restart the TTL of a live entry.
    pub async fn refresh_ttl(&self, program: &str) -> WaypointResult<()> {
        let program = normalize_program_name(program)?;
        Ok(self.cache.refresh_ttl(&program).await?)
    }

    pub async fn clear(&self) -> WaypointResult<u64> {
        let removed = self.cache.clear().await?;
        tracing::warn!(removed, "Roadmap cache cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use waypoint_core::{CacheConfig, ManualClock, StorageError, WaypointError};
    use waypoint_storage::InMemoryRoadmapStore;
    use waypoint_test_utils::fixtures;

    fn maintenance(clock: Arc<ManualClock>) -> CacheMaintenance {
        CacheMaintenance::new(Arc::new(RoadmapCache::new(
            Arc::new(InMemoryRoadmapStore::new()),
            clock,
            CacheConfig::default().with_ttl(Duration::from_secs(3600)),
        )))
    }

    #[tokio::test]
    async fn test_refresh_unknown_program_is_not_found() {
        let m = maintenance(Arc::new(ManualClock::default()));
        let err = m.refresh_ttl("Unknown Program").await.unwrap_err();
        assert!(matches!(err, WaypointError::Storage(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_sweep_then_stats() {
        let clock = Arc::new(ManualClock::default());
        let m = maintenance(clock.clone());
        m.cache
            .put("Physics", &fixtures::payload("Physics", 2, 2))
            .await
            .unwrap();
        m.cache
            .put_with_ttl(
                "Chemistry",
                &fixtures::payload("Chemistry", 1, 1),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(120));
        assert_eq!(m.invalidate_expired().await.unwrap(), 1);

        let stats = m.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.ttl_seconds, 3600);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let m = maintenance(Arc::new(ManualClock::default()));
        m.cache
            .put("Physics", &fixtures::payload("Physics", 1, 1))
            .await
            .unwrap();
        assert!(m.delete(" Physics ").await.unwrap());
        assert!(!m.delete("Physics").await.unwrap());
        assert_eq!(m.clear().await.unwrap(), 0);
    }
}
