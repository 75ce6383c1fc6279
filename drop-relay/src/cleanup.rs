//! Background cleanup task for expired and burned shares.
//!
//! Runs periodically to delete shares past their expiry or already burned,
//! and to evict idle rate limiter entries.

use crate::config::CleanupConfig;
use crate::limits::RateLimits;
use crate::storage::{current_timestamp, ShareStorage, SqliteStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Run one cleanup pass. Returns the number of shares deleted.
pub async fn run_cleanup(storage: &SqliteStorage, rate_limits: &RateLimits) -> u64 {
    rate_limits.shrink();

    match storage.cleanup(current_timestamp()).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!("Cleanup: deleted {} expired or burned shares", deleted);
            } else {
                tracing::debug!("Cleanup: nothing to delete");
            }
            deleted
        }
        Err(e) => {
            tracing::error!("Cleanup error: {}", e);
            0
        }
    }
}

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    storage: Arc<SqliteStorage>,
    rate_limits: RateLimits,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Cleanup task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;
            run_cleanup(&storage, &rate_limits).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::storage::NewShare;
    use zerok_drop_types::ShareId;

    fn share(id: &str, expires_at: i64) -> NewShare {
        NewShare {
            share_id: ShareId::new(id).unwrap(),
            encrypted_data: b"ciphertext".to_vec(),
            encrypted_filename: b"name".to_vec(),
            iv: vec![0; 24],
            filename_iv: vec![1; 24],
            file_size: 0,
            mime_type: "text/plain".into(),
            password_hash: None,
            download_limit: None,
            one_time_download: false,
            created_at: 0,
            expires_at,
        }
    }

    #[tokio::test]
    async fn cleanup_pass_removes_expired_shares() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let limits = RateLimits::new(&LimitsConfig::default());
        let now = current_timestamp();

        storage.insert_share(&share("expired", now - 10)).await.unwrap();
        storage.insert_share(&share("live", now + 3600)).await.unwrap();

        assert_eq!(run_cleanup(&storage, &limits).await, 1);
        assert!(storage
            .get_share(&ShareId::new("live").unwrap())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn cleanup_task_disabled() {
        let storage = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let config = CleanupConfig {
            interval_secs: 1,
            enabled: false,
        };

        let handle = spawn_cleanup_task(storage, RateLimits::new(&LimitsConfig::default()), config);

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");
    }
}
