//! HTTP client capability

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::cookies::PersistentCookieJar;
use super::types::{ApiRequest, ApiResponse, RequestBody, TransportFailure};

/// Raw HTTP capability.
///
/// Returns `Ok` for every completed exchange regardless of status code;
/// `Err` only for failures where no response was received.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportFailure>;
}

/// Production client backed by reqwest.
///
/// Keeps a cookie jar so cookie-mode sessions (HTTP-only `ACCESS_TOKEN`
/// cookie) are replayed automatically. The jar lives in memory unless built
/// with [`ReqwestClient::with_cookie_jar`].
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportFailure> {
        Self::build(base_url, reqwest::Client::builder().cookie_store(true).timeout(timeout))
    }

    /// Client whose cookies persist across processes
    pub fn with_cookie_jar(
        base_url: &str,
        timeout: Duration,
        jar: Arc<PersistentCookieJar>,
    ) -> Result<Self, TransportFailure> {
        Self::build(base_url, reqwest::Client::builder().cookie_provider(jar).timeout(timeout))
    }

    fn build(base_url: &str, builder: reqwest::ClientBuilder) -> Result<Self, TransportFailure> {
        let client = builder
            .build()
            .map_err(|e| TransportFailure::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportFailure> {
        let url = format!("{}{}", self.base_url, request.path);

        let builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers);

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::File {
                field,
                file_name,
                content_type,
                bytes,
            } => {
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(|e| TransportFailure::Request(format!("Invalid content type: {}", e)))?;
                builder.multipart(Form::new().part(field, part))
            }
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        tracing::debug!(method = %request.method, url = %url, status, "HTTP exchange complete");

        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::Timeout
    } else if e.is_builder() {
        TransportFailure::Request(e.to_string())
    } else {
        TransportFailure::Network(e.to_string())
    }
}
