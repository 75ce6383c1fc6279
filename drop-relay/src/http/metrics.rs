//! Prometheus metrics endpoint.

use crate::server::DropRelay;
use crate::storage::{current_timestamp, ShareStorage};
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus text exposition content type.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<DropRelay>>) -> impl IntoResponse {
    let body = render(&relay).await;
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body)
}

async fn render(relay: &DropRelay) -> String {
    let m = relay.metrics();

    // Counters
    let uploads = m.uploads_total.load(Ordering::Relaxed);
    let downloads = m.downloads_total.load(Ordering::Relaxed);
    let burns = m.burns_total.load(Ordering::Relaxed);
    let bytes_rx = m.bytes_received.load(Ordering::Relaxed);
    let bytes_tx = m.bytes_sent.load(Ordering::Relaxed);
    let password_failures = m.password_failures.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    // Gauges (storage queries are best effort)
    let shares = relay
        .storage()
        .share_count(current_timestamp())
        .await
        .unwrap_or(0);
    let storage_bytes = relay.storage().stored_bytes().await.unwrap_or(0);
    let tracked_clients = relay.rate_limits().tracked_clients();

    format!(
        r#"# HELP drop_relay_info Server information
# TYPE drop_relay_info gauge
drop_relay_info{{version="{version}"}} 1

# HELP drop_relay_uploads_total Total shares stored
# TYPE drop_relay_uploads_total counter
drop_relay_uploads_total {uploads}

# HELP drop_relay_downloads_total Total downloads released
# TYPE drop_relay_downloads_total counter
drop_relay_downloads_total {downloads}

# HELP drop_relay_burns_total Total shares burned by a download
# TYPE drop_relay_burns_total counter
drop_relay_burns_total {burns}

# HELP drop_relay_bytes_received_total Total ciphertext bytes received
# TYPE drop_relay_bytes_received_total counter
drop_relay_bytes_received_total {bytes_rx}

# HELP drop_relay_bytes_sent_total Total ciphertext bytes sent
# TYPE drop_relay_bytes_sent_total counter
drop_relay_bytes_sent_total {bytes_tx}

# HELP drop_relay_password_failures_total Total rejected share passwords
# TYPE drop_relay_password_failures_total counter
drop_relay_password_failures_total {password_failures}

# HELP drop_relay_rate_limit_hits_total Total rate limit rejections
# TYPE drop_relay_rate_limit_hits_total counter
drop_relay_rate_limit_hits_total {rate_limits}

# HELP drop_relay_errors_total Total internal errors
# TYPE drop_relay_errors_total counter
drop_relay_errors_total {errors}

# HELP drop_relay_shares Number of live shares
# TYPE drop_relay_shares gauge
drop_relay_shares {shares}

# HELP drop_relay_storage_bytes Total ciphertext bytes in database
# TYPE drop_relay_storage_bytes gauge
drop_relay_storage_bytes {storage_bytes}

# HELP drop_relay_tracked_clients Clients tracked by the rate limiters
# TYPE drop_relay_tracked_clients gauge
drop_relay_tracked_clients {tracked_clients}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::password::PasswordHashing;
    use crate::storage::SqliteStorage;

    #[tokio::test]
    async fn render_includes_counters_and_gauges() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let relay = DropRelay::with_password_hashing(
            Config::default(),
            storage,
            PasswordHashing::insecure_fast().unwrap(),
        );
        relay.metrics().record_rate_limit();

        let body = render(&relay).await;
        assert!(body.contains("# TYPE drop_relay_uploads_total counter"));
        assert!(body.contains("drop_relay_rate_limit_hits_total 1"));
        assert!(body.contains("drop_relay_shares 0"));
        assert!(body.contains(&format!(
            "drop_relay_info{{version=\"{}\"}} 1",
            env!("CARGO_PKG_VERSION")
        )));
    }
}
