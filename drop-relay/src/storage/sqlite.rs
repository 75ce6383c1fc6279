//! SQLite storage backend for drop-relay.

use super::{Claim, ClaimedShare, NewShare, ShareRecord, ShareStorage};
use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use zerok_drop_types::ShareId;

/// SQLite-based share storage.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;

        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // One connection that never recycles: the database lives in it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shares (
                share_id TEXT PRIMARY KEY,
                encrypted_data BLOB NOT NULL,
                encrypted_filename BLOB NOT NULL,
                iv BLOB NOT NULL,
                filename_iv BLOB NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                password_hash TEXT,
                download_limit INTEGER,
                download_count INTEGER NOT NULL DEFAULT 0,
                one_time_download INTEGER NOT NULL DEFAULT 0,
                burned INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_shares_expires ON shares(expires_at)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_shares_burned ON shares(burned)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }
}

#[async_trait]
impl ShareStorage for SqliteStorage {
    async fn insert_share(&self, share: &NewShare) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO shares (
                share_id, encrypted_data, encrypted_filename, iv, filename_iv,
                file_size, mime_type, password_hash, download_limit,
                one_time_download, created_at, expires_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(share.share_id.as_str())
        .bind(&share.encrypted_data)
        .bind(&share.encrypted_filename)
        .bind(&share.iv)
        .bind(&share.filename_iv)
        .bind(share.file_size as i64)
        .bind(&share.mime_type)
        .bind(share.password_hash.as_deref())
        .bind(share.download_limit.map(i64::from))
        .bind(share.one_time_download)
        .bind(share.created_at)
        .bind(share.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StorageError::Duplicate {
                    share_id: share.share_id.to_string(),
                })
            }
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    async fn get_share(&self, share_id: &ShareId) -> Result<Option<ShareRecord>, StorageError> {
        let row = sqlx::query_as::<_, ShareRow>(
            r#"
            SELECT share_id, file_size, mime_type, password_hash, download_limit,
                   download_count, one_time_download, burned, created_at, expires_at
            FROM shares
            WHERE share_id = ?1
            "#,
        )
        .bind(share_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    async fn claim_download(&self, share_id: &ShareId, now: i64) -> Result<Claim, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        // The UPDATE takes the write lock first, so concurrent claims serialize
        let row = sqlx::query_as::<_, ClaimRow>(
            r#"
            UPDATE shares
            SET download_count = download_count + 1,
                burned = CASE
                    WHEN one_time_download = 1 THEN 1
                    WHEN download_limit IS NOT NULL AND download_count + 1 >= download_limit THEN 1
                    ELSE 0
                END
            WHERE share_id = ?1 AND burned = 0 AND expires_at > ?2
            RETURNING encrypted_data, encrypted_filename, iv, filename_iv, file_size,
                      mime_type, one_time_download, download_limit, download_count, burned
            "#,
        )
        .bind(share_id.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        let Some(row) = row else {
            let state: Option<(bool,)> =
                sqlx::query_as("SELECT burned FROM shares WHERE share_id = ?1")
                    .bind(share_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(StorageError::Database)?;

            return Ok(match state {
                Some((true,)) => Claim::Burned,
                _ => Claim::NotFound,
            });
        };

        if row.burned {
            sqlx::query(
                "UPDATE shares SET encrypted_data = x'', encrypted_filename = x'' WHERE share_id = ?1",
            )
            .bind(share_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;
        }

        tx.commit().await.map_err(StorageError::Database)?;

        let download_count = u32::try_from(row.download_count)
            .map_err(|_| corrupt(share_id, "download_count"))?;
        let download_limit = row
            .download_limit
            .map(u32::try_from)
            .transpose()
            .map_err(|_| corrupt(share_id, "download_limit"))?;

        Ok(Claim::Granted(ClaimedShare {
            encrypted_data: row.encrypted_data,
            encrypted_filename: row.encrypted_filename,
            iv: row.iv,
            filename_iv: row.filename_iv,
            file_size: u64::try_from(row.file_size).map_err(|_| corrupt(share_id, "file_size"))?,
            mime_type: row.mime_type,
            one_time_download: row.one_time_download,
            downloads_remaining: download_limit.map(|limit| limit.saturating_sub(download_count)),
            burned: row.burned,
        }))
    }

    async fn cleanup(&self, now: i64) -> Result<u64, StorageError> {
        let result = sqlx::query(
            r#"
            DELETE FROM shares WHERE expires_at <= ?1 OR burned = 1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(result.rows_affected())
    }

    async fn share_count(&self, now: i64) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shares WHERE burned = 0 AND expires_at > ?1",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(count as u64)
    }

    async fn stored_bytes(&self) -> Result<u64, StorageError> {
        let size: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(LENGTH(encrypted_data) + LENGTH(encrypted_filename)) FROM shares",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(size.unwrap_or(0) as u64)
    }
}

fn corrupt(share_id: &ShareId, column: &str) -> StorageError {
    StorageError::Corrupt {
        share_id: share_id.to_string(),
        reason: format!("{} out of range", column),
    }
}

/// Internal row type for metadata queries.
#[derive(sqlx::FromRow)]
struct ShareRow {
    share_id: String,
    file_size: i64,
    mime_type: String,
    password_hash: Option<String>,
    download_limit: Option<i64>,
    download_count: i64,
    one_time_download: bool,
    burned: bool,
    created_at: i64,
    expires_at: i64,
}

/// Internal row type returned by the claim.
#[derive(sqlx::FromRow)]
struct ClaimRow {
    encrypted_data: Vec<u8>,
    encrypted_filename: Vec<u8>,
    iv: Vec<u8>,
    filename_iv: Vec<u8>,
    file_size: i64,
    mime_type: String,
    one_time_download: bool,
    download_limit: Option<i64>,
    download_count: i64,
    burned: bool,
}

impl TryFrom<ShareRow> for ShareRecord {
    type Error = StorageError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        let share_id = ShareId::new(row.share_id.clone()).map_err(|e| StorageError::Corrupt {
            share_id: row.share_id.clone(),
            reason: e.to_string(),
        })?;

        Ok(ShareRecord {
            file_size: u64::try_from(row.file_size).map_err(|_| corrupt(&share_id, "file_size"))?,
            mime_type: row.mime_type,
            password_hash: row.password_hash,
            download_limit: row
                .download_limit
                .map(u32::try_from)
                .transpose()
                .map_err(|_| corrupt(&share_id, "download_limit"))?,
            download_count: u32::try_from(row.download_count)
                .map_err(|_| corrupt(&share_id, "download_count"))?,
            one_time_download: row.one_time_download,
            burned: row.burned,
            created_at: row.created_at,
            expires_at: row.expires_at,
            share_id,
        })
    }
}
