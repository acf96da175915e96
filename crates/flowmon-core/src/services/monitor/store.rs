//! Snapshot storage layer
//!
//! Persists one observation per account per query to SQLite. Snapshots
//! are append-only and pruned past a 30-day retention window.

use sqlx::{FromRow, SqlitePool};

use super::buckets::BucketSet;
use super::delta::{carrier_date, DiffSet};
use super::error::MonitorError;
use super::report::Package;
use serde::{Deserialize, Serialize};

/// Days of history kept per account
pub const RETENTION_DAYS: i64 = 30;

// ============================================================================
// Snapshot
// ============================================================================

/// One persisted usage observation
///
/// Created once per successful query cycle, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier (UUID)
    pub id: String,
    /// Subscriber phone number
    pub account_id: String,
    /// Observation time, epoch seconds
    pub timestamp: i64,
    /// Calendar date in the carrier's timezone (Y-m-d)
    pub date: String,
    /// Primary package name from the report
    pub main_package: String,
    /// Summed base buckets
    pub buckets: BucketSet,
    /// Deltas relative to the previous snapshot
    pub diff: DiffSet,
    /// Flattened package list the buckets were built from
    pub packages: Vec<Package>,
}

impl Snapshot {
    /// Create a fully-computed snapshot for persistence
    pub fn new(
        account_id: impl Into<String>,
        timestamp: i64,
        main_package: impl Into<String>,
        buckets: BucketSet,
        diff: DiffSet,
        packages: Vec<Package>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            timestamp,
            date: carrier_date(timestamp).format("%Y-%m-%d").to_string(),
            main_package: main_package.into(),
            buckets,
            diff,
            packages,
        }
    }
}

// ============================================================================
// Database Row
// ============================================================================

/// Database row representation of a snapshot
///
/// Buckets, diff and packages live in JSON TEXT columns; the row maps
/// directly to the `usage_snapshots` table schema.
#[derive(Debug, Clone, FromRow)]
pub struct StoredSnapshot {
    pub id: String,
    pub account_id: String,
    pub timestamp: i64,
    pub date: String,
    pub main_package: String,
    pub buckets: String,
    pub diff: String,
    pub packages: String,
}

impl StoredSnapshot {
    /// Convert database row to a Snapshot
    ///
    /// Returns `None` if any JSON column fails to parse.
    pub fn to_snapshot(&self) -> Option<Snapshot> {
        let buckets: BucketSet = serde_json::from_str(&self.buckets).ok()?;
        let diff: DiffSet = serde_json::from_str(&self.diff).ok()?;
        let packages: Vec<Package> = serde_json::from_str(&self.packages).ok()?;

        Some(Snapshot {
            id: self.id.clone(),
            account_id: self.account_id.clone(),
            timestamp: self.timestamp,
            date: self.date.clone(),
            main_package: self.main_package.clone(),
            buckets,
            diff,
            packages,
        })
    }
}

// ============================================================================
// SnapshotStore
// ============================================================================

/// Storage layer for usage snapshots
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    /// Create a new SnapshotStore with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent snapshot for an account, if any
    ///
    /// Timestamps are whole seconds, so two cycles in the same second tie;
    /// insertion order (rowid) breaks the tie toward the newer row.
    pub async fn load_latest(&self, account_id: &str) -> Result<Option<Snapshot>, MonitorError> {
        let row = sqlx::query_as::<_, StoredSnapshot>(
            r#"
            SELECT id, account_id, timestamp, date, main_package, buckets, diff, packages
            FROM usage_snapshots
            WHERE account_id = ?
            ORDER BY timestamp DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MonitorError::Storage(format!("failed to load latest snapshot: {}", e)))?;

        match row {
            Some(row) => match row.to_snapshot() {
                Some(snapshot) => Ok(Some(snapshot)),
                None => {
                    log::warn!(
                        "[monitor:store] discarding undecodable snapshot {} for {}",
                        row.id,
                        account_id
                    );
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Persist a fully-computed snapshot
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        let buckets = serde_json::to_string(&snapshot.buckets)
            .map_err(|e| MonitorError::Storage(format!("failed to encode buckets: {}", e)))?;
        let diff = serde_json::to_string(&snapshot.diff)
            .map_err(|e| MonitorError::Storage(format!("failed to encode diff: {}", e)))?;
        let packages = serde_json::to_string(&snapshot.packages)
            .map_err(|e| MonitorError::Storage(format!("failed to encode packages: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO usage_snapshots
            (id, account_id, timestamp, date, main_package, buckets, diff, packages)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.account_id)
        .bind(snapshot.timestamp)
        .bind(&snapshot.date)
        .bind(&snapshot.main_package)
        .bind(&buckets)
        .bind(&diff)
        .bind(&packages)
        .execute(&self.pool)
        .await
        .map_err(|e| MonitorError::Storage(format!("failed to save snapshot: {}", e)))?;

        log::debug!(
            "[monitor:store] saved snapshot {} for {} at {}",
            snapshot.id,
            snapshot.account_id,
            snapshot.timestamp
        );
        Ok(())
    }

    /// Snapshots for an account within the last `days`, oldest first
    pub async fn history(&self, account_id: &str, days: i64) -> Result<Vec<Snapshot>, MonitorError> {
        let cutoff = chrono::Utc::now().timestamp() - days * 86_400;

        let rows = sqlx::query_as::<_, StoredSnapshot>(
            r#"
            SELECT id, account_id, timestamp, date, main_package, buckets, diff, packages
            FROM usage_snapshots
            WHERE account_id = ? AND timestamp >= ?
            ORDER BY timestamp ASC, rowid ASC
            "#,
        )
        .bind(account_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MonitorError::Storage(format!("failed to load snapshot history: {}", e)))?;

        Ok(rows.iter().filter_map(|r| r.to_snapshot()).collect())
    }

    /// Delete an account's snapshots older than the given timestamp
    ///
    /// Returns the number of rows deleted.
    pub async fn prune(&self, account_id: &str, older_than_ts: i64) -> Result<u64, MonitorError> {
        let result = sqlx::query(
            "DELETE FROM usage_snapshots WHERE account_id = ? AND timestamp < ?",
        )
        .bind(account_id)
        .bind(older_than_ts)
        .execute(&self.pool)
        .await
        .map_err(|e| MonitorError::Storage(format!("failed to prune snapshots: {}", e)))?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            log::info!(
                "[monitor:store] pruned {} snapshots for {}",
                deleted,
                account_id
            );
        }
        Ok(deleted)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::services::monitor::buckets::Bucket;

    async fn test_store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).await.unwrap();
        (dir, SnapshotStore::new(db.pool))
    }

    fn sample_snapshot(account_id: &str, timestamp: i64) -> Snapshot {
        let buckets = BucketSet {
            common_limited: Bucket {
                total: 100.0,
                used: 40.0,
                remain: 60.0,
            },
            ..BucketSet::default()
        };
        Snapshot::new(account_id, timestamp, "5G Plus", buckets, DiffSet::default(), vec![])
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let (_dir, store) = test_store().await;

        assert!(store.load_latest("13812345678").await.unwrap().is_none());

        let older = sample_snapshot("13812345678", 1_000);
        let newer = sample_snapshot("13812345678", 2_000);
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let latest = store.load_latest("13812345678").await.unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
        assert_eq!(latest.buckets.common_limited.used, 40.0);
        assert_eq!(latest.main_package, "5G Plus");
    }

    #[tokio::test]
    async fn test_latest_same_second_prefers_last_saved() {
        let (_dir, store) = test_store().await;

        // Back-to-back cycles can land on the same epoch second; the one
        // saved last must win or its diff chain would restart.
        let first = sample_snapshot("13812345678", 5_000);
        let second = sample_snapshot("13812345678", 5_000);
        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let latest = store.load_latest("13812345678").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn test_latest_is_per_account() {
        let (_dir, store) = test_store().await;

        store.save(&sample_snapshot("13812345678", 5_000)).await.unwrap();
        store.save(&sample_snapshot("13900001111", 9_000)).await.unwrap();

        let latest = store.load_latest("13812345678").await.unwrap().unwrap();
        assert_eq!(latest.account_id, "13812345678");
        assert_eq!(latest.timestamp, 5_000);
    }

    #[tokio::test]
    async fn test_prune_respects_cutoff_and_account() {
        let (_dir, store) = test_store().await;

        store.save(&sample_snapshot("13812345678", 1_000)).await.unwrap();
        store.save(&sample_snapshot("13812345678", 2_000)).await.unwrap();
        store.save(&sample_snapshot("13812345678", 3_000)).await.unwrap();
        store.save(&sample_snapshot("13900001111", 1_000)).await.unwrap();

        let deleted = store.prune("13812345678", 2_500).await.unwrap();
        assert_eq!(deleted, 2);

        let latest = store.load_latest("13812345678").await.unwrap().unwrap();
        assert_eq!(latest.timestamp, 3_000);

        // Other account untouched
        assert!(store.load_latest("13900001111").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_history_ordering() {
        let (_dir, store) = test_store().await;
        let now = chrono::Utc::now().timestamp();

        store.save(&sample_snapshot("13812345678", now - 60)).await.unwrap();
        store.save(&sample_snapshot("13812345678", now - 3_600)).await.unwrap();

        let history = store.history("13812345678", 7).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].timestamp < history[1].timestamp);
    }

    #[test]
    fn test_snapshot_date_from_timestamp() {
        // 2026-03-10 12:00 UTC is the same calendar day in UTC+8
        let snapshot = sample_snapshot("13812345678", 1_773_144_000);
        assert_eq!(snapshot.date.len(), 10);
        assert!(snapshot.date.starts_with("20"));
    }

    #[test]
    fn test_stored_snapshot_bad_json() {
        let stored = StoredSnapshot {
            id: "x".to_string(),
            account_id: "13812345678".to_string(),
            timestamp: 0,
            date: "2026-01-01".to_string(),
            main_package: String::new(),
            buckets: "not json".to_string(),
            diff: "{}".to_string(),
            packages: "[]".to_string(),
        };
        assert!(stored.to_snapshot().is_none());
    }
}
