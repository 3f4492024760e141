//! Authenticated Transport
//!
//! Wraps an [`HttpClient`] with the two cross-cutting session behaviours:
//! - Request augmentation: `Authorization: Bearer <credential>` on every
//!   request whose path is not a public endpoint
//! - Response observation: 401 (and 403 unless disabled) clears the session
//!   and broadcasts [`AuthEvent::Unauthenticated`], while the caller still
//!   receives [`ClientError::Auth`]
//!
//! Network failures pass through untouched and never clear the session.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

use super::client::HttpClient;
use super::types::{ApiRequest, ApiResponse, TransportFailure};
use crate::error::{ClientError, Step};
use crate::session::SessionStore;

/// Endpoints reachable without a session. Prefix match on the request path.
pub const PUBLIC_PATHS: &[&str] = &["/api/v1/auth/login", "/api/v1/auth/signup"];

const EVENT_CAPACITY: usize = 16;

/// Session lifecycle notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// The session was cleared after an authorization failure
    Unauthenticated { step: Step, status: u16, redirect_to: String },
}

/// The only place credentials are attached and sessions invalidated
#[derive(Clone)]
pub struct AuthenticatedTransport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    client: Arc<dyn HttpClient>,
    session: Arc<SessionStore>,
    events: broadcast::Sender<AuthEvent>,
    clear_on_forbidden: bool,
    login_path: String,
}

impl AuthenticatedTransport {
    pub fn new(client: Arc<dyn HttpClient>, session: Arc<SessionStore>) -> Self {
        Self::with_options(client, session, true, "/login")
    }

    pub fn with_options(
        client: Arc<dyn HttpClient>,
        session: Arc<SessionStore>,
        clear_on_forbidden: bool,
        login_path: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(TransportInner {
                client,
                session,
                events,
                clear_on_forbidden,
                login_path: login_path.into(),
            }),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    /// Listen for session invalidations
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send a request and require a 2xx response
    pub async fn send(&self, step: Step, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let request = self.augment(step, request)?;
        let path = request.path.clone();

        let response = self
            .inner
            .client
            .execute(request)
            .await
            .map_err(|source| {
                tracing::warn!(step = %step, path = %path, error = %source, "Request failed");
                ClientError::Transport { step, source }
            })?;

        self.observe(step, &path, response)
    }

    /// Send a request and decode a JSON response body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        step: Step,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let response = self.send(step, request).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| ClientError::protocol(step, format!("Malformed response body: {}", e)))
    }

    // ========================================================================
    // Interceptors
    // ========================================================================

    fn augment(&self, step: Step, mut request: ApiRequest) -> Result<ApiRequest, ClientError> {
        if is_public(&request.path) {
            return Ok(request);
        }

        if let Some(credential) = self.inner.session.credential() {
            let value = HeaderValue::from_str(&format!("Bearer {}", credential)).map_err(|_| {
                ClientError::Transport {
                    step,
                    source: TransportFailure::Request("Credential is not a valid header value".to_string()),
                }
            })?;
            request.headers.insert(AUTHORIZATION, value);
        }

        Ok(request)
    }

    fn observe(&self, step: Step, path: &str, response: ApiResponse) -> Result<ApiResponse, ClientError> {
        let status = response.status;

        if status == 401 || (status == 403 && self.inner.clear_on_forbidden) {
            self.inner.session.clear_session();
            tracing::info!(step = %step, path = %path, status, "Authorization failed, session cleared");

            // No subscribers is fine
            let _ = self.inner.events.send(AuthEvent::Unauthenticated {
                step,
                status,
                redirect_to: self.inner.login_path.clone(),
            });

            return Err(ClientError::Auth { step, status });
        }

        if !response.is_success() {
            let detail = response.error_detail();
            tracing::warn!(step = %step, path = %path, status, detail = %detail, "Request rejected");
            return Err(ClientError::Transport {
                step,
                source: TransportFailure::Status { status, detail },
            });
        }

        Ok(response)
    }
}

/// Whether a path is reachable without a session
pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|p| path.starts_with(p))
}

// ============================================================================
// Tests
// ============================================================================
