//! In-process roadmap store backed by a sharded concurrent map.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use waypoint_core::{
    top_entry_order, RoadmapEntry, RoadmapPayload, StorageError, StoreStats, TopEntry,
};

use crate::store::RoadmapStore;

/// [`RoadmapStore`] kept in a [`DashMap`].
///
/// The map's per-shard entry lock makes `upsert` and `record_access` atomic
/// per key. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryRoadmapStore {
    entries: DashMap<String, RoadmapEntry>,
}

impl InMemoryRoadmapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, live or not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw row lookup that ignores expiry.
    pub fn entry(&self, key: &str) -> Option<RoadmapEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }
}

#[async_trait]
impl RoadmapStore for InMemoryRoadmapStore {
    async fn get_live(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RoadmapEntry>, StorageError> {
        Ok(self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value().clone()))
    }

    async fn upsert(
        &self,
        key: &str,
        payload: &RoadmapPayload,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.payload = payload.clone();
                entry.updated_at = now;
                entry.expires_at = expires_at;
                entry.version += 1;
                Ok(entry.version)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(RoadmapEntry {
                    key: key.to_string(),
                    payload: payload.clone(),
                    created_at: now,
                    updated_at: now,
                    expires_at,
                    version: 1,
                    hit_count: 0,
                    last_accessed_at: None,
                });
                Ok(1)
            }
        }
    }

    async fn record_access(&self, key: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.hit_count += 1;
            entry.last_accessed_at = Some(entry.last_accessed_at.map_or(at, |prev| prev.max(at)));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut removed = 0u64;
        self.entries.retain(|_, entry| {
            if entry.is_sweepable(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn extend_ttl(
        &self,
        key: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.updated_at = now;
                entry.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self) -> Result<u64, StorageError> {
        let removed = self.entries.len() as u64;
        self.entries.clear();
        Ok(removed)
    }

    async fn stats(
        &self,
        now: DateTime<Utc>,
        top_limit: usize,
    ) -> Result<StoreStats, StorageError> {
        let mut total = 0u64;
        let mut active = 0u64;
        let mut live: Vec<TopEntry> = Vec::new();

        for entry in self.entries.iter() {
            total += 1;
            if entry.is_live(now) {
                active += 1;
                live.push(entry.summary());
            }
        }

        live.sort_by(top_entry_order);
        live.truncate(top_limit);

        Ok(StoreStats {
            total,
            active,
            expired: total - active,
            top_entries: live,
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
