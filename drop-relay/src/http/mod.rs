//! HTTP endpoints for drop-relay.
//!
//! Provides the upload and download API plus health and metrics.

pub mod health;
mod metrics;

use crate::limits::RateLimitError;
use crate::server::{DropRelay, ShareError};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use zerok_drop_types::{
    DownloadRequest, DownloadResponse, ErrorBody, ShareId, UploadRequest, UploadResponse,
    API_PREFIX, UPLOAD_PATH,
};

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<DropRelay>) -> Router {
    let max_body = relay.config().storage.max_body_bytes;
    let mut router = Router::new()
        .route(UPLOAD_PATH, post(upload_handler))
        .route(
            &format!("{}/download/:share_id", API_PREFIX),
            post(download_handler),
        )
        .route("/health", get(health::health_handler));

    if relay.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router
        .layer(DefaultBodyLimit::max(max_body))
        .layer(Extension(relay))
}

/// Error response carrying an [`ErrorBody`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::new(error),
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body = self.body.with_details(details);
        self
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ShareError> for ApiError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::Invalid(details) => {
                Self::new(StatusCode::BAD_REQUEST, "Invalid upload").with_details(details)
            }
            ShareError::NotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            ShareError::Burned => Self::new(StatusCode::GONE, err.to_string()),
            ShareError::PasswordRequired | ShareError::PasswordIncorrect => {
                Self::new(StatusCode::UNAUTHORIZED, err.to_string())
            }
            ShareError::Storage(_) | ShareError::Password(_) | ShareError::Task(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Too many requests").with_details(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let error = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "File too large"
        } else {
            "Malformed request"
        };
        Self::new(status, error).with_details(rejection.body_text())
    }
}

/// Client address for rate limiting; loopback when unknown (tests).
fn client_ip(connect_info: Option<ConnectInfo<SocketAddr>>) -> IpAddr {
    connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Record failures that are the relay's fault, and rate limit hits.
fn note_failure(relay: &DropRelay, err: &ApiError) {
    match err.status {
        StatusCode::TOO_MANY_REQUESTS => relay.metrics().record_rate_limit(),
        s if s.is_server_error() => relay.metrics().record_error(),
        _ => {}
    }
}

async fn upload_handler(
    Extension(relay): Extension<Arc<DropRelay>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let ip = client_ip(connect_info);
    let result = async {
        relay.rate_limits().check_upload(ip)?;
        let Json(request) = payload?;
        let response = relay.store(request).await.map_err(|e| {
            if matches!(
                e,
                ShareError::Storage(_) | ShareError::Password(_) | ShareError::Task(_)
            ) {
                tracing::error!("Upload from {} failed: {}", ip, e);
            }
            e
        })?;
        Ok::<_, ApiError>((StatusCode::CREATED, Json(response)))
    }
    .await;

    if let Err(err) = &result {
        tracing::debug!("Upload from {} rejected: {}", ip, err.body.describe());
        note_failure(&relay, err);
    }
    result
}

async fn download_handler(
    Extension(relay): Extension<Arc<DropRelay>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Path(share_id): Path<String>,
    body: Bytes,
) -> Result<Json<DownloadResponse>, ApiError> {
    let ip = client_ip(connect_info);
    let result = async {
        relay.rate_limits().check_download(ip)?;
        let share_id = ShareId::new(share_id).map_err(|_| ShareError::NotFound)?;

        // An empty body is a download without a password.
        let request: DownloadRequest = if body.is_empty() {
            DownloadRequest::default()
        } else {
            serde_json::from_slice(&body).map_err(|e| {
                ApiError::new(StatusCode::BAD_REQUEST, "Malformed request")
                    .with_details(e.to_string())
            })?
        };

        let response = relay
            .fetch(&share_id, request.password.as_deref())
            .await
            .map_err(|e| {
                if matches!(
                    e,
                    ShareError::Storage(_) | ShareError::Password(_) | ShareError::Task(_)
                ) {
                    tracing::error!("Download of {} failed: {}", share_id, e);
                }
                e
            })?;
        Ok::<_, ApiError>(Json(response))
    }
    .await;

    if let Err(err) = &result {
        tracing::debug!("Download from {} rejected: {}", ip, err.body.describe());
        note_failure(&relay, err);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::password::PasswordHashing;
    use crate::storage::SqliteStorage;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;
    use zerok_drop_core::{sealed_len, NONCE_SIZE};
    use zerok_drop_types::{download_path, CaptchaFields};

    async fn test_relay_with(config: Config) -> Arc<DropRelay> {
        let storage = SqliteStorage::in_memory().await.unwrap();
        Arc::new(DropRelay::with_password_hashing(
            config,
            storage,
            PasswordHashing::insecure_fast().unwrap(),
        ))
    }

    async fn test_relay() -> Arc<DropRelay> {
        test_relay_with(Config::default()).await
    }

    fn upload_request(file_size: u64) -> UploadRequest {
        UploadRequest {
            encrypted_data: vec![3; sealed_len(file_size) as usize],
            encrypted_filename: vec![4; 20],
            iv: vec![5; NONCE_SIZE],
            filename_iv: vec![6; NONCE_SIZE],
            file_size,
            mime_type: "application/octet-stream".into(),
            expiration_minutes: 10,
            password: None,
            download_limit: None,
            one_time_download: false,
            captcha: CaptchaFields::default(),
        }
    }

    fn post_json(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn upload(app: &Router, request: &UploadRequest) -> UploadResponse {
        let response = app
            .clone()
            .oneshot(post_json(UPLOAD_PATH, serde_json::to_vec(request).unwrap()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        read_json(response).await
    }

    async fn download(app: &Router, share_id: &ShareId, password: Option<&str>) -> Response {
        let body = serde_json::to_vec(&DownloadRequest {
            password: password.map(str::to_string),
        })
        .unwrap();
        app.clone()
            .oneshot(post_json(&download_path(share_id), body))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = build_router(test_relay().await);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let app = build_router(test_relay().await);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_can_be_disabled() {
        let mut config = Config::default();
        config.http.metrics_enabled = false;
        let app = build_router(test_relay_with(config).await);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_then_download() {
        let app = build_router(test_relay().await);
        let request = upload_request(100);

        let uploaded = upload(&app, &request).await;
        let response = download(&app, &uploaded.share_id, None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: DownloadResponse = read_json(response).await;
        assert_eq!(body.encrypted_data, request.encrypted_data);
        assert_eq!(body.filename, request.encrypted_filename);
        assert_eq!(body.file_size, 100);
        assert_eq!(body.downloads_remaining, None);
    }

    #[tokio::test]
    async fn download_without_body_is_allowed() {
        let app = build_router(test_relay().await);
        let uploaded = upload(&app, &upload_request(1)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(download_path(&uploaded.share_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn one_time_download_is_gone_afterwards() {
        let app = build_router(test_relay().await);
        let mut request = upload_request(10);
        request.one_time_download = true;
        let uploaded = upload(&app, &request).await;

        assert_eq!(
            download(&app, &uploaded.share_id, None).await.status(),
            StatusCode::OK
        );

        let second = download(&app, &uploaded.share_id, None).await;
        assert_eq!(second.status(), StatusCode::GONE);
        let body: ErrorBody = read_json(second).await;
        assert_eq!(body.error, "File is no longer available");
    }

    #[tokio::test]
    async fn unknown_share_is_404() {
        let app = build_router(test_relay().await);
        let id = ShareId::new("AAAAAAAAAAAAAAAA").unwrap();

        let response = download(&app, &id, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "File not found or expired");
    }

    #[tokio::test]
    async fn password_errors_are_401() {
        let app = build_router(test_relay().await);
        let mut request = upload_request(10);
        request.password = Some("hunter2".into());
        let uploaded = upload(&app, &request).await;

        let missing = download(&app, &uploaded.share_id, None).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorBody = read_json(missing).await;
        assert_eq!(body.error, "Password required");

        let wrong = download(&app, &uploaded.share_id, Some("hunter3")).await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorBody = read_json(wrong).await;
        assert_eq!(body.error, "Incorrect password");

        let right = download(&app, &uploaded.share_id, Some("hunter2")).await;
        assert_eq!(right.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_upload_is_400() {
        let app = build_router(test_relay().await);
        let mut request = upload_request(10);
        request.iv = vec![0; 12];

        let response = app
            .oneshot(post_json(UPLOAD_PATH, serde_json::to_vec(&request).unwrap()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "Invalid upload");
        assert!(body.details.is_some());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let app = build_router(test_relay().await);

        let response = app
            .oneshot(post_json(UPLOAD_PATH, b"{not json".to_vec()))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        let body: ErrorBody = read_json(response).await;
        assert_eq!(body.error, "Malformed request");
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let mut config = Config::default();
        config.storage.max_body_bytes = 1024;
        let app = build_router(test_relay_with(config).await);

        let response = app
            .oneshot(post_json(
                UPLOAD_PATH,
                serde_json::to_vec(&upload_request(4096)).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn upload_rate_limit_is_429() {
        let mut config = Config::default();
        config.limits.uploads_per_minute = 1;
        let relay = test_relay_with(config).await;
        let app = build_router(relay.clone());

        upload(&app, &upload_request(1)).await;
        let response = app
            .oneshot(post_json(
                UPLOAD_PATH,
                serde_json::to_vec(&upload_request(1)).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            relay
                .metrics()
                .rate_limit_hits
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
