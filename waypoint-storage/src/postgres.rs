//! PostgreSQL roadmap store.
//!
//! One row per program in `roadmap_cache`. Concurrent writers are serialized
//! by `INSERT ... ON CONFLICT DO UPDATE`, and hit counting is a single
//! `UPDATE ... SET hit_count = hit_count + 1`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::types::Json;
use tokio_postgres::{NoTls, Row};
use waypoint_core::{RoadmapEntry, RoadmapPayload, StorageError, StoreStats, TopEntry};

use crate::store::RoadmapStore;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection and checkout timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "waypoint".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("WAYPOINT_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("WAYPOINT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("WAYPOINT_DB_NAME").unwrap_or_else(|_| "waypoint".to_string()),
            user: std::env::var("WAYPOINT_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("WAYPOINT_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("WAYPOINT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("WAYPOINT_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened until the pool is first used.
    pub fn create_pool(&self) -> Result<Pool, StorageError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::unavailable(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS roadmap_cache (
    program_name     TEXT PRIMARY KEY,
    payload          JSONB NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL,
    updated_at       TIMESTAMPTZ NOT NULL,
    expires_at       TIMESTAMPTZ NOT NULL,
    version          BIGINT NOT NULL DEFAULT 1,
    hit_count        BIGINT NOT NULL DEFAULT 0,
    last_accessed_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_roadmap_cache_expires_at
    ON roadmap_cache (expires_at);
CREATE INDEX IF NOT EXISTS idx_roadmap_cache_last_accessed_at
    ON roadmap_cache (last_accessed_at DESC);
CREATE INDEX IF NOT EXISTS idx_roadmap_cache_hit_count
    ON roadmap_cache (hit_count DESC);
"#;

// ============================================================================
// STORE
// ============================================================================

/// [`RoadmapStore`] persisted in PostgreSQL.
#[derive(Clone)]
pub struct PostgresRoadmapStore {
    pool: Pool,
}

impl PostgresRoadmapStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a store from configuration.
    pub fn from_config(config: &DbConfig) -> Result<Self, StorageError> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Create the cache table and its indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA)
            .await
            .map_err(StorageError::unavailable)?;
        tracing::debug!("roadmap_cache schema ensured");
        Ok(())
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool.get().await.map_err(StorageError::unavailable)
    }

    fn entry_from_row(row: &Row) -> Result<RoadmapEntry, StorageError> {
        let key: String = row.try_get("program_name").map_err(StorageError::unavailable)?;
        let raw: serde_json::Value = row.try_get("payload").map_err(StorageError::unavailable)?;
        let payload: RoadmapPayload =
            serde_json::from_value(raw).map_err(|e| StorageError::Serialization {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        Ok(RoadmapEntry {
            payload,
            created_at: row.try_get("created_at").map_err(StorageError::unavailable)?,
            updated_at: row.try_get("updated_at").map_err(StorageError::unavailable)?,
            expires_at: row.try_get("expires_at").map_err(StorageError::unavailable)?,
            version: row.try_get("version").map_err(StorageError::unavailable)?,
            hit_count: row.try_get("hit_count").map_err(StorageError::unavailable)?,
            last_accessed_at: row
                .try_get("last_accessed_at")
                .map_err(StorageError::unavailable)?,
            key,
        })
    }
}

impl std::fmt::Debug for PostgresRoadmapStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRoadmapStore")
            .field("pool_size", &self.pool_size())
            .finish()
    }
}

#[async_trait]
impl RoadmapStore for PostgresRoadmapStore {
    async fn get_live(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RoadmapEntry>, StorageError> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT program_name, payload, created_at, updated_at, expires_at,
                        version, hit_count, last_accessed_at
                 FROM roadmap_cache
                 WHERE program_name = $1 AND expires_at > $2",
                &[&key, &now],
            )
            .await
            .map_err(StorageError::unavailable)?;

        row.as_ref().map(Self::entry_from_row).transpose()
    }

    async fn upsert(
        &self,
        key: &str,
        payload: &RoadmapPayload,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO roadmap_cache
                    (program_name, payload, created_at, updated_at, expires_at, version, hit_count)
                 VALUES ($1, $2, $3, $3, $4, 1, 0)
                 ON CONFLICT (program_name) DO UPDATE
                 SET payload = EXCLUDED.payload,
                     updated_at = EXCLUDED.updated_at,
                     expires_at = EXCLUDED.expires_at,
                     version = roadmap_cache.version + 1
                 RETURNING version",
                &[&key, &Json(payload), &now, &expires_at],
            )
            .await
            .map_err(StorageError::unavailable)?;

        row.try_get(0).map_err(StorageError::unavailable)
    }

    async fn record_access(&self, key: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE roadmap_cache
             SET hit_count = hit_count + 1,
                 last_accessed_at = GREATEST(COALESCE(last_accessed_at, $2), $2)
             WHERE program_name = $1",
            &[&key, &at],
        )
        .await
        .map_err(StorageError::unavailable)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.get_conn().await?;
        let removed = conn
            .execute("DELETE FROM roadmap_cache WHERE program_name = $1", &[&key])
            .await
            .map_err(StorageError::unavailable)?;
        Ok(removed > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM roadmap_cache WHERE expires_at < $1", &[&now])
            .await
            .map_err(StorageError::unavailable)
    }

    async fn extend_ttl(
        &self,
        key: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE roadmap_cache
                 SET expires_at = $3, updated_at = $2
                 WHERE program_name = $1 AND expires_at > $2",
                &[&key, &now, &expires_at],
            )
            .await
            .map_err(StorageError::unavailable)?;
        Ok(updated == 1)
    }

    async fn clear(&self) -> Result<u64, StorageError> {
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM roadmap_cache", &[])
            .await
            .map_err(StorageError::unavailable)
    }

    async fn stats(
        &self,
        now: DateTime<Utc>,
        top_limit: usize,
    ) -> Result<StoreStats, StorageError> {
        let conn = self.get_conn().await?;

        let counts = conn
            .query_one(
                "SELECT COUNT(*), COUNT(*) FILTER (WHERE expires_at > $1) FROM roadmap_cache",
                &[&now],
            )
            .await
            .map_err(StorageError::unavailable)?;
        let total: i64 = counts.try_get(0).map_err(StorageError::unavailable)?;
        let active: i64 = counts.try_get(1).map_err(StorageError::unavailable)?;

        let limit = top_limit as i64;
        let rows = conn
            .query(
                "SELECT program_name, hit_count, last_accessed_at, expires_at, version
                 FROM roadmap_cache
                 WHERE expires_at > $1
                 ORDER BY hit_count DESC, last_accessed_at DESC NULLS LAST, program_name ASC
                 LIMIT $2",
                &[&now, &limit],
            )
            .await
            .map_err(StorageError::unavailable)?;

        let top_entries = rows
            .iter()
            .map(|row| {
                Ok(TopEntry {
                    key: row.try_get(0).map_err(StorageError::unavailable)?,
                    hit_count: row.try_get(1).map_err(StorageError::unavailable)?,
                    last_accessed_at: row.try_get(2).map_err(StorageError::unavailable)?,
                    expires_at: row.try_get(3).map_err(StorageError::unavailable)?,
                    version: row.try_get(4).map_err(StorageError::unavailable)?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let total = total.max(0) as u64;
        let active = active.max(0) as u64;
        Ok(StoreStats {
            total,
            active,
            expired: total.saturating_sub(active),
            top_entries,
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(StorageError::unavailable)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
