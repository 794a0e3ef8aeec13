//! Roadmap cache policy layer.
//!
//! [`RoadmapCache`] owns the TTL, the clock and the hit/miss counters, and
//! delegates persistence to a [`RoadmapStore`]. Reads never return an expired
//! entry. Access statistics for hits are recorded on the [`SideTaskPool`] so
//! that a slow or failing store never delays or fails a read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use waypoint_core::clock::to_chrono;
use waypoint_core::{
    hit_rate, CacheConfig, CacheStats, Clock, RoadmapEntry, RoadmapPayload, StorageError,
    TOP_ENTRIES_LIMIT,
};

use crate::side_task::{ErrorObserver, SideTaskMetricsSnapshot, SideTaskPool};
use crate::store::RoadmapStore;

/// TTL-aware cache of roadmap documents.
pub struct RoadmapCache {
    store: Arc<dyn RoadmapStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    side_tasks: SideTaskPool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RoadmapCache {
    /// Create a cache whose side task failures are logged.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(store: Arc<dyn RoadmapStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        let side_tasks =
            SideTaskPool::with_logging(config.side_task_workers, config.side_task_queue);
        Self::with_side_tasks(store, clock, config, side_tasks)
    }

    /// Create a cache reporting side task failures to `observer`.
    pub fn with_observer(
        store: Arc<dyn RoadmapStore>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
        observer: ErrorObserver,
    ) -> Self {
        let side_tasks =
            SideTaskPool::new(config.side_task_workers, config.side_task_queue, observer);
        Self::with_side_tasks(store, clock, config, side_tasks)
    }

    fn with_side_tasks(
        store: Arc<dyn RoadmapStore>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
        side_tasks: SideTaskPool,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            side_tasks,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn store(&self) -> &Arc<dyn RoadmapStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Get the live payload for `key`.
    pub async fn get(&self, key: &str) -> Result<Option<RoadmapPayload>, StorageError> {
        Ok(self.get_entry(key).await?.map(|entry| entry.payload))
    }

    /// Get the live payload for `key` without touching any statistics.
    pub async fn peek(&self, key: &str) -> Result<Option<RoadmapPayload>, StorageError> {
        let entry = self.store.get_live(key, self.clock.now()).await?;
        Ok(entry.map(|entry| entry.payload))
    }

    /// Get the live entry for `key`, counting a hit or a miss.
    ///
    /// On a hit, the access is recorded in the background. The returned entry
    /// reflects the statistics as they were before this read.
    pub async fn get_entry(&self, key: &str) -> Result<Option<RoadmapEntry>, StorageError> {
        let now = self.clock.now();
        match self.store.get_live(key, now).await? {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                let store = Arc::clone(&self.store);
                let access_key = key.to_string();
                self.side_tasks.submit("record_access", async move {
                    store.record_access(&access_key, now).await
                });
                Ok(Some(entry))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Write `payload` under `key` with the configured TTL. Returns the version.
    pub async fn put(&self, key: &str, payload: &RoadmapPayload) -> Result<i64, StorageError> {
        self.put_with_ttl(key, payload, self.config.ttl).await
    }

    /// Write `payload` under `key` expiring after `ttl`. Returns the version.
    pub async fn put_with_ttl(
        &self,
        key: &str,
        payload: &RoadmapPayload,
        ttl: Duration,
    ) -> Result<i64, StorageError> {
        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl)?;
        let version = self.store.upsert(key, payload, now, expires_at).await?;
        tracing::debug!(program = %key, version, expires_at = %expires_at, "Roadmap cached");
        Ok(version)
    }

    /// Remove the entry for `key`. Idempotent; returns whether a row existed.
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.store.delete(key).await
    }

    /// Remove every entry whose expiry has passed. Returns the number removed.
    pub async fn invalidate_expired(&self) -> Result<u64, StorageError> {
        self.store.delete_expired(self.clock.now()).await
    }

    /// Restart the TTL of a live entry from now.
    ///
    /// Fails with [`StorageError::NotFound`] when the key is absent or expired.
    pub async fn refresh_ttl(&self, key: &str) -> Result<(), StorageError> {
        let now = self.clock.now();
        let expires_at = expiry_after(now, self.config.ttl)?;
        if self.store.extend_ttl(key, now, expires_at).await? {
            Ok(())
        } else {
            Err(StorageError::not_found(key))
        }
    }

    /// Remove every entry. Returns the number removed.
    pub async fn clear(&self) -> Result<u64, StorageError> {
        self.store.clear().await
    }

    // ========================================================================
    // STATISTICS
    // ========================================================================

    /// Aggregate cache statistics with the ten hottest live entries.
    pub async fn stats(&self) -> Result<CacheStats, StorageError> {
        let store_stats = self
            .store
            .stats(self.clock.now(), TOP_ENTRIES_LIMIT)
            .await?;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        Ok(CacheStats {
            total: store_stats.total,
            active: store_stats.active,
            expired: store_stats.expired,
            ttl_seconds: self.config.ttl.as_secs(),
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            top_entries: store_stats.top_entries,
        })
    }

    /// Wait for queued access-statistics updates to finish.
    pub async fn flush_side_tasks(&self) {
        self.side_tasks.wait_idle().await;
    }

    pub fn side_task_metrics(&self) -> SideTaskMetricsSnapshot {
        self.side_tasks.metrics()
    }
}

impl std::fmt::Debug for RoadmapCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoadmapCache")
            .field("backend", &self.store.backend_name())
            .field("ttl", &self.config.ttl)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

/// `now + ttl`, failing instead of overflowing the timestamp range.
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, StorageError> {
    now.checked_add_signed(to_chrono(ttl))
        .ok_or_else(|| StorageError::unavailable(format!("ttl {:?} overflows expiry time", ttl)))
}
