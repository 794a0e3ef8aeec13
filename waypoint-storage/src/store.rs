//! Persistence backend trait for roadmap cache entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use waypoint_core::{RoadmapEntry, RoadmapPayload, StorageError, StoreStats};

/// Raw persistence for roadmap cache rows.
///
/// Implementations hold at most one row per key and make `upsert` atomic, so
/// concurrent writers for the same program resolve to "last write wins"
/// without any in-process locking. Expiry policy lives in the caller: every
/// method that depends on the current time receives it as `now`.
///
/// All I/O failures are reported as [`StorageError::Unavailable`].
#[async_trait]
pub trait RoadmapStore: Send + Sync {
    /// Get the entry for `key` if it is live at `now`.
    async fn get_live(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RoadmapEntry>, StorageError>;

    /// Insert or fully rewrite the entry for `key`.
    ///
    /// A rewrite keeps `created_at` and `hit_count`, replaces the payload,
    /// `updated_at` and `expires_at`, and bumps `version`. Returns the new
    /// version.
    async fn upsert(
        &self,
        key: &str,
        payload: &RoadmapPayload,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// Record a cache hit: increment `hit_count` and move `last_accessed_at`
    /// forward to `at`. A missing key is not an error.
    async fn record_access(&self, key: &str, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Remove the row for `key`. Returns whether a row existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove every row with `expires_at < now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;

    /// Move the expiry of a live entry. Returns false when the key is absent
    /// or already expired.
    async fn extend_ttl(
        &self,
        key: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Remove every row. Returns the number removed.
    async fn clear(&self) -> Result<u64, StorageError>;

    /// Row counts at `now` and the `top_limit` hottest live entries.
    async fn stats(&self, now: DateTime<Utc>, top_limit: usize) -> Result<StoreStats, StorageError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
