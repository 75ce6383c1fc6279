//! HttpTransport - relay access over HTTPS using reqwest.
//!
//! Uploads are streamed in fixed-size pieces so progress can be reported
//! while the body is on the wire.

use super::{Transport, TransportError};
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use zerok_drop_types::{
    download_path, DownloadRequest, DownloadResponse, ErrorBody, ShareId, UploadRequest,
    UploadResponse, UPLOAD_PATH,
};

/// Size of each streamed piece of the upload body.
pub const UPLOAD_PIECE_SIZE: usize = 64 * 1024;

/// Configuration for HttpTransport.
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Relay base URL, e.g. `https://drop.example`.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
}

impl HttpTransportConfig {
    /// Configuration for `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the whole-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// HttpTransport implements the Transport trait against a relay's HTTP API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a new HttpTransport.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The relay base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Malformed(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Turn a non-success response into a TransportError.
async fn error_from_response(response: reqwest::Response) -> TransportError {
    let status = response.status();
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.describe(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    TransportError::from_status(status.as_u16(), message)
}

/// Stream `body` in pieces, reporting progress as each piece is pulled.
fn progress_body(body: Vec<u8>, progress: ProgressReporter) -> reqwest::Body {
    let body = Arc::new(body);
    let total = body.len() as u64;

    let stream = futures_util::stream::unfold(0usize, move |offset| {
        let body = Arc::clone(&body);
        let progress = progress.clone();
        async move {
            if offset >= body.len() {
                return None;
            }
            let end = (offset + UPLOAD_PIECE_SIZE).min(body.len());
            let piece = body[offset..end].to_vec();
            progress.report(end as u64, total);
            Some((Ok::<Vec<u8>, std::io::Error>(piece), end))
        }
    });

    reqwest::Body::wrap_stream(stream)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn upload(
        &self,
        request: &UploadRequest,
        progress: &ProgressReporter,
    ) -> Result<UploadResponse, TransportError> {
        let body =
            serde_json::to_vec(request).map_err(|e| TransportError::Malformed(e.to_string()))?;
        let total = body.len() as u64;
        progress.report(0, total);

        tracing::debug!(
            "Uploading {} bytes to {}",
            total,
            self.url(UPLOAD_PATH)
        );

        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .header(CONTENT_TYPE, "application/json")
            .body(progress_body(body, progress.clone()))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let upload: UploadResponse = response.json().await?;
        tracing::debug!("Upload stored as share {}", upload.share_id);
        Ok(upload)
    }

    async fn download(
        &self,
        share_id: &ShareId,
        password: Option<&str>,
    ) -> Result<DownloadResponse, TransportError> {
        let request = DownloadRequest {
            password: password.map(str::to_string),
        };

        tracing::debug!("Fetching share {}", share_id);

        let response = self
            .client
            .post(self.url(&download_path(share_id)))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_builder() {
        let config = HttpTransportConfig::new("https://drop.example")
            .with_timeout(Duration::from_secs(5))
            .with_connect_timeout(Duration::from_secs(1));
        assert_eq!(config.base_url, "https://drop.example");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = HttpTransport::new(HttpTransportConfig::new("https://drop.example/"))
            .unwrap();
        assert_eq!(transport.base_url(), "https://drop.example");
        assert_eq!(
            transport.url(UPLOAD_PATH),
            "https://drop.example/api/v1/upload"
        );
    }

    #[tokio::test]
    async fn unreachable_relay_is_network_error() {
        let transport = HttpTransport::new(
            HttpTransportConfig::new("http://127.0.0.1:1")
                .with_connect_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let id = ShareId::new("abc123").unwrap();
        let err = transport.download(&id, None).await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {err:?}");
    }
}
