//! Expiry Sweep Background Task
//!
//! Expired roadmap entries are never served, but their rows stay in the store
//! until something deletes them. This task calls
//! [`CacheMaintenance::invalidate_expired`] on a fixed interval so the table
//! does not grow without bound.
//!
//! # Configuration
//!
//! ```rust
//! use waypoint_api::jobs::ExpirySweepConfig;
//! use std::time::Duration;
//!
//! let config = ExpirySweepConfig {
//!     interval: Duration::from_secs(300),
//!     log_sweeps: true,
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use waypoint_pipeline::CacheMaintenance;

use crate::constants::DEFAULT_SWEEP_INTERVAL_SECS;
use crate::telemetry::metrics;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the expiry sweep background task.
#[derive(Debug, Clone)]
pub struct ExpirySweepConfig {
    /// How often to sweep (default: 5 minutes)
    pub interval: Duration,

    /// Whether to log sweeps that removed rows (default: true)
    pub log_sweeps: bool,
}

impl Default for ExpirySweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            log_sweeps: true,
        }
    }
}

impl ExpirySweepConfig {
    /// Create ExpirySweepConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `WAYPOINT_SWEEP_INTERVAL_SECS`: Seconds between sweeps (default: 300, 0 is ignored)
    /// - `WAYPOINT_SWEEP_LOG`: Whether to log sweeps (default: true)
    pub fn from_env() -> Self {
        let interval = Duration::from_secs(
            std::env::var("WAYPOINT_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
        );

        let log_sweeps = std::env::var("WAYPOINT_SWEEP_LOG")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            interval,
            log_sweeps,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity since startup.
#[derive(Debug, Default)]
pub struct ExpirySweepMetrics {
    /// Sweeps attempted
    pub sweeps: AtomicU64,

    /// Rows removed across all sweeps
    pub entries_removed: AtomicU64,

    /// Sweeps that failed
    pub sweep_errors: AtomicU64,
}

impl ExpirySweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> ExpirySweepSnapshot {
        ExpirySweepSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            entries_removed: self.entries_removed.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirySweepSnapshot {
    pub sweeps: u64,
    pub entries_removed: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically removes expired cache entries.
///
/// The first sweep runs immediately. Runs until `shutdown_rx` carries `true`
/// or its sender is dropped, and returns the metrics collected.
pub async fn expiry_sweep_task(
    maintenance: CacheMaintenance,
    config: ExpirySweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ExpirySweepMetrics> {
    let metrics = Arc::new(ExpirySweepMetrics::new());

    let mut sweep_interval = interval(config.interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Expiry sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Expiry sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep_once(&maintenance, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweeps = snapshot.sweeps,
        entries_removed = snapshot.entries_removed,
        sweep_errors = snapshot.sweep_errors,
        "Expiry sweep task completed"
    );

    metrics
}

/// Perform one sweep.
async fn sweep_once(
    maintenance: &CacheMaintenance,
    config: &ExpirySweepConfig,
    metrics: &ExpirySweepMetrics,
) {
    metrics.sweeps.fetch_add(1, Ordering::Relaxed);

    match maintenance.invalidate_expired().await {
        Ok(removed) => {
            metrics.entries_removed.fetch_add(removed, Ordering::Relaxed);
            if let Some(m) = metrics::metrics() {
                m.record_sweep("sweeper", removed);
            }
            if removed == 0 {
                tracing::trace!("Expiry sweep found nothing to remove");
            } else if config.log_sweeps {
                tracing::debug!(removed, "Expiry sweep removed entries");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Expiry sweep failed");
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::{CacheConfig, ManualClock};
    use waypoint_storage::{InMemoryRoadmapStore, RoadmapCache};
    use waypoint_test_utils::{fixtures, FailingStore};

    fn cache(
        store: Arc<dyn waypoint_storage::RoadmapStore>,
        clock: Arc<ManualClock>,
    ) -> Arc<RoadmapCache> {
        Arc::new(RoadmapCache::new(
            store,
            clock,
            CacheConfig::default().with_ttl(Duration::from_secs(3600)),
        ))
    }

    #[test]
    fn test_config_default() {
        let config = ExpirySweepConfig::default();
        assert_eq!(config.interval, Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS));
        assert!(config.log_sweeps);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = ExpirySweepMetrics::new();
        metrics.sweeps.store(4, Ordering::Relaxed);
        metrics.entries_removed.store(7, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sweeps, 4);
        assert_eq!(snapshot.entries_removed, 7);
        assert_eq!(snapshot.sweep_errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(Arc::new(InMemoryRoadmapStore::new()), clock.clone());
        cache
            .put_with_ttl(
                "Chemistry",
                &fixtures::payload("Chemistry", 1, 1),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        cache
            .put("Physics", &fixtures::payload("Physics", 1, 1))
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(120));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = ExpirySweepConfig {
            interval: Duration::from_secs(10),
            log_sweeps: true,
        };
        let handle = tokio::spawn(expiry_sweep_task(
            CacheMaintenance::new(cache.clone()),
            config,
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.sweeps, 3);
        assert_eq!(snapshot.entries_removed, 1);
        assert_eq!(snapshot.sweep_errors, 0);
        assert_eq!(cache.stats().await.unwrap().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_survives_store_outage() {
        let cache = cache(Arc::new(FailingStore), Arc::new(ManualClock::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(expiry_sweep_task(
            CacheMaintenance::new(cache),
            ExpirySweepConfig {
                interval: Duration::from_secs(1),
                log_sweeps: false,
            },
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        drop(shutdown_tx);
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.sweeps, 3);
        assert_eq!(snapshot.sweep_errors, 3);
    }
}
