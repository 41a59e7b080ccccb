use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::adb::DeviceInfo;

/// The initial migration SQL, embedded at compile time.
const INIT_MIGRATION: &str = include_str!("migrations/001_init.sql");

/// Initialize the SQLite database pool and run migrations.
pub async fn init(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations manually (avoids compile-time DATABASE_URL requirement).
    run_migrations(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

/// Apply migrations using a simple version-tracking approach.
pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create migrations tracking table if it doesn't exist.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (\
         version INTEGER PRIMARY KEY, \
         applied_at TEXT NOT NULL DEFAULT (datetime('now')))",
    )
    .execute(pool)
    .await?;

    let applied: bool = sqlx::query("SELECT 1 FROM _migrations WHERE version = 1")
        .fetch_optional(pool)
        .await?
        .is_some();

    if !applied {
        // Split on semicolons and execute each statement.
        for statement in INIT_MIGRATION.split(';') {
            // Strip leading comment lines to get to the actual SQL.
            let code = statement
                .lines()
                .skip_while(|l| l.trim().starts_with("--") || l.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            let stmt = code.trim();
            if stmt.is_empty() {
                continue;
            }
            sqlx::query(stmt).execute(pool).await?;
        }

        sqlx::query("INSERT INTO _migrations (version) VALUES (1)")
            .execute(pool)
            .await?;

        info!("Applied migration 001_init.sql");
    }

    Ok(())
}

/// Persistence failure from a store append. Logged by the caller, never
/// escalated into a collection loop.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Device metadata attached to every persisted sample.
#[derive(Debug, Clone)]
pub struct SampleMeta {
    pub ip: String,
    pub device: String,
    pub os_version: String,
}

impl SampleMeta {
    pub fn new(ip: &str, info: &DeviceInfo) -> Self {
        Self {
            ip: ip.to_string(),
            device: info.name.clone(),
            os_version: info.os_version.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CpuMemorySample {
    pub meta: SampleMeta,
    pub cpu_user: f64,
    pub mem_total_kb: f64,
    pub mem_used_kb: f64,
    pub mem_percent: f64,
}

#[derive(Debug, Clone)]
pub struct StorageSample {
    pub meta: SampleMeta,
    pub used: f64,
    pub used_percent: f64,
}

#[derive(Debug, Clone)]
pub struct UptimeSample {
    pub meta: SampleMeta,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct FrameSample {
    pub meta: SampleMeta,
    pub janky_frames: i64,
}

/// Append-only sink for historical samples.
///
/// The collector treats the store as an external collaborator: appends are
/// fire-and-forget from the loop's perspective and must be safe for
/// concurrent writes from multiple devices' loops.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn append_cpu_memory(&self, sample: &CpuMemorySample) -> Result<(), StoreError>;
    async fn append_storage(&self, sample: &StorageSample) -> Result<(), StoreError>;
    async fn append_uptime(&self, sample: &UptimeSample) -> Result<(), StoreError>;
    async fn append_frames(&self, sample: &FrameSample) -> Result<(), StoreError>;
}

/// The production store, backed by the SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricStore for SqliteStore {
    async fn append_cpu_memory(&self, sample: &CpuMemorySample) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cpu_memory_samples \
             (ip, device, os_version, cpu_user, mem_total_kb, mem_used_kb, mem_percent) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sample.meta.ip)
        .bind(&sample.meta.device)
        .bind(&sample.meta.os_version)
        .bind(sample.cpu_user)
        .bind(sample.mem_total_kb)
        .bind(sample.mem_used_kb)
        .bind(sample.mem_percent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_storage(&self, sample: &StorageSample) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO storage_samples (ip, device, os_version, used, used_percent) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&sample.meta.ip)
        .bind(&sample.meta.device)
        .bind(&sample.meta.os_version)
        .bind(sample.used)
        .bind(sample.used_percent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_uptime(&self, sample: &UptimeSample) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO uptime_samples (ip, device, os_version, uptime_seconds) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&sample.meta.ip)
        .bind(&sample.meta.device)
        .bind(&sample.meta.os_version)
        .bind(sample.uptime_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_frames(&self, sample: &FrameSample) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO frame_samples (ip, device, os_version, janky_frames) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&sample.meta.ip)
        .bind(&sample.meta.device)
        .bind(&sample.meta.os_version)
        .bind(sample.janky_frames)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> SampleMeta {
        SampleMeta {
            ip: "10.0.0.5".to_string(),
            device: "pixel_7".to_string(),
            os_version: "14".to_string(),
        }
    }

    #[tokio::test]
    async fn test_migrations_apply_cleanly() {
        let pool = init(":memory:").await.expect("DB init failed");

        let expected_tables = [
            "cpu_memory_samples",
            "storage_samples",
            "uptime_samples",
            "frame_samples",
        ];

        for table in &expected_tables {
            let count: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{table}'"
            ))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("Query failed for table '{table}': {e}"));

            assert_eq!(count, 1, "Table '{table}' should exist after migration");
        }
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = init(":memory:").await.expect("First init failed");
        run_migrations(&pool)
            .await
            .expect("Second migration run should succeed");
    }

    #[tokio::test]
    async fn test_append_cpu_memory_round_trip() {
        let pool = init(":memory:").await.expect("DB init failed");
        let store = SqliteStore::new(pool.clone());

        store
            .append_cpu_memory(&CpuMemorySample {
                meta: meta(),
                cpu_user: 12.5,
                mem_total_kb: 5_847_124.0,
                mem_used_kb: 5_234_188.0,
                mem_percent: 89.5,
            })
            .await
            .expect("append failed");

        let (count, cpu_user): (i64, f64) =
            sqlx::query_as("SELECT COUNT(*), MAX(cpu_user) FROM cpu_memory_samples")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
        assert!((cpu_user - 12.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_append_frames_stores_metadata() {
        let pool = init(":memory:").await.expect("DB init failed");
        let store = SqliteStore::new(pool.clone());

        store
            .append_frames(&FrameSample {
                meta: meta(),
                janky_frames: 453,
            })
            .await
            .expect("append failed");

        let (ip, device, janky): (String, String, i64) =
            sqlx::query_as("SELECT ip, device, janky_frames FROM frame_samples")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(ip, "10.0.0.5");
        assert_eq!(device, "pixel_7");
        assert_eq!(janky, 453);
    }
}
