//! Cache entry and statistics types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roadmap::RoadmapPayload;

/// Number of entries reported in [`CacheStats::top_entries`].
pub const TOP_ENTRIES_LIMIT: usize = 10;

/// One cached roadmap row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapEntry {
    /// Program name, exact and case-sensitive.
    pub key: String,
    pub payload: RoadmapPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Bumped on every full rewrite, never on statistics updates.
    pub version: i64,
    pub hit_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl RoadmapEntry {
    /// An entry is live strictly before its expiry instant.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Eligible for the expiry sweep.
    pub fn is_sweepable(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn summary(&self) -> TopEntry {
        TopEntry {
            key: self.key.clone(),
            hit_count: self.hit_count,
            last_accessed_at: self.last_accessed_at,
            expires_at: self.expires_at,
            version: self.version,
        }
    }
}

/// Per-entry row in the statistics report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TopEntry {
    pub key: String,
    pub hit_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub version: i64,
}

/// Ordering used for top entries: hit count descending, then most recent access.
/// Never-accessed entries sort after accessed ones on ties.
pub fn top_entry_order(a: &TopEntry, b: &TopEntry) -> std::cmp::Ordering {
    b.hit_count
        .cmp(&a.hit_count)
        .then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
        .then_with(|| a.key.cmp(&b.key))
}

/// Row counts and hottest entries as reported by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: u64,
    pub active: u64,
    pub expired: u64,
    pub top_entries: Vec<TopEntry>,
}

/// Aggregate cache health exposed to operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheStats {
    /// Unique keys in the store, live or not yet swept.
    pub total: u64,
    pub active: u64,
    pub expired: u64,
    pub ttl_seconds: u64,
    /// Cache hits observed by this process.
    pub hits: u64,
    /// Cache misses observed by this process.
    pub misses: u64,
    pub hit_rate: f64,
    pub top_entries: Vec<TopEntry>,
}

/// Calculate the hit rate (0.0 to 1.0).
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn top(key: &str, hits: i64, accessed_mins_ago: Option<i64>) -> TopEntry {
        let now = Utc::now();
        TopEntry {
            key: key.to_string(),
            hit_count: hits,
            last_accessed_at: accessed_mins_ago.map(|m| now - Duration::minutes(m)),
            expires_at: now + Duration::hours(1),
            version: 1,
        }
    }

    #[test]
    fn test_hit_rate() {
        assert!((hit_rate(80, 20) - 0.8).abs() < 0.001);
        assert!((hit_rate(0, 0) - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_top_entry_order_breaks_ties_by_recent_access() {
        let mut entries = vec![
            top("stale", 5, Some(30)),
            top("never", 5, None),
            top("hot", 9, Some(60)),
            top("fresh", 5, Some(1)),
        ];
        entries.sort_by(top_entry_order);
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["hot", "fresh", "stale", "never"]);
    }
}
