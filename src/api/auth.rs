//! Login, signup and logout

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::TextliftApi;
use crate::error::{ClientError, Step};
use crate::session::SessionMode;
use crate::transport::ApiRequest;

const LOGIN_PATH: &str = "/api/v1/auth/login";
const SIGNUP_PATH: &str = "/api/v1/auth/signup";
const LOGOUT_PATH: &str = "/api/v1/auth/logout";

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Login response in token mode
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,

    /// Token lifetime in milliseconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TextliftApi {
    /// Authenticate and start a session.
    ///
    /// Token mode stores the returned bearer token. Cookie mode relies on
    /// the HTTP-only cookie set by the server and only marks the session
    /// active locally.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post(LOGIN_PATH)
            .with_json(&body)
            .map_err(|source| ClientError::Transport {
                step: Step::Login,
                source,
            })?;

        let session = self.session();
        match session.mode() {
            SessionMode::Token => {
                let response: LoginResponse = self.transport.send_json(Step::Login, request).await?;
                let token = response
                    .token
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| ClientError::protocol(Step::Login, "Login response has no token"))?;
                let ttl = response
                    .expires_in
                    .map(Duration::from_millis)
                    .unwrap_or(self.session_ttl);
                session.set_session(&token, ttl)?;
            }
            SessionMode::Cookie => {
                self.transport.send(Step::Login, request).await?;
                session.mark_active(self.session_ttl)?;
            }
        }

        tracing::info!(email = %email, mode = %session.mode(), "Logged in");
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn signup(&self, email: &str, password: &str, full_name: &str) -> Result<(), ClientError> {
        let body = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
        };
        let request = ApiRequest::post(SIGNUP_PATH)
            .with_json(&body)
            .map_err(|source| ClientError::Transport {
                step: Step::Signup,
                source,
            })?;

        self.transport.send(Step::Signup, request).await?;
        tracing::info!(email = %email, "Account created");
        Ok(())
    }

    /// End the session on the server and locally.
    ///
    /// The local session is cleared even when the server call fails; the
    /// server error is still returned.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self
            .transport
            .send(Step::Logout, ApiRequest::post(LOGOUT_PATH))
            .await;
        self.session().clear_session();

        match result {
            Ok(_) => {
                tracing::info!("Logged out");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Logout request failed; local session cleared");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryStore, SessionStore};
    use crate::transport::mock::MockHttpClient;
    use crate::transport::{AuthenticatedTransport, TransportFailure};
    use serde_json::json;
    use std::sync::Arc;

    fn setup(mode: SessionMode) -> (TextliftApi, Arc<MockHttpClient>) {
        let mock = Arc::new(MockHttpClient::new());
        let session = Arc::new(SessionStore::new(Arc::new(MemoryStore::new()), mode));
        let transport = AuthenticatedTransport::new(mock.clone(), session);
        (TextliftApi::new(transport, Duration::from_secs(3600)), mock)
    }

    #[tokio::test]
    async fn test_token_login_stores_session() {
        let (api, mock) = setup(SessionMode::Token);
        mock.push_json(200, json!({"token": "jwt-abc", "expiresIn": 3_600_000}));

        api.login("ada@example.com", "hunter2").await.unwrap();

        assert!(api.session().is_valid());
        assert_eq!(api.session().credential().as_deref(), Some("jwt-abc"));
        let call = &mock.calls()[0];
        assert_eq!(call.path, LOGIN_PATH);
        assert_eq!(call.json, Some(json!({"email": "ada@example.com", "password": "hunter2"})));
    }

    #[tokio::test]
    async fn test_token_login_without_token_is_protocol_error() {
        let (api, mock) = setup(SessionMode::Token);
        mock.push_json(200, json!({}));

        let err = api.login("ada@example.com", "hunter2").await.unwrap_err();

        assert!(matches!(err, ClientError::Protocol { step: Step::Login, .. }));
        assert!(!api.session().is_valid());
    }

    #[tokio::test]
    async fn test_cookie_login_marks_active() {
        let (api, mock) = setup(SessionMode::Cookie);
        mock.push(crate::transport::ApiResponse::new(200, ""));

        api.login("ada@example.com", "hunter2").await.unwrap();

        assert!(api.session().is_valid());
        assert_eq!(api.session().credential(), None);
    }

    #[tokio::test]
    async fn test_failed_login_does_not_create_session() {
        let (api, mock) = setup(SessionMode::Token);
        mock.push_json(401, json!({"detail": "Bad credentials"}));

        let err = api.login("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(err.step(), Some(Step::Login));
        assert!(!api.session().is_valid());
    }

    #[tokio::test]
    async fn test_signup_uses_camel_case() {
        let (api, mock) = setup(SessionMode::Token);
        mock.push_json(200, json!({}));

        api.signup("ada@example.com", "hunter2", "Ada Lovelace").await.unwrap();

        assert_eq!(
            mock.calls()[0].json,
            Some(json!({"email": "ada@example.com", "password": "hunter2", "fullName": "Ada Lovelace"}))
        );
        assert!(!api.session().is_valid());
    }

    #[tokio::test]
    async fn test_logout_clears_even_on_failure() {
        let (api, mock) = setup(SessionMode::Token);
        api.session().set_session("tok", Duration::from_secs(600)).unwrap();
        mock.push_failure(TransportFailure::Network("offline".to_string()));

        let err = api.logout().await.unwrap_err();

        assert_eq!(err.step(), Some(Step::Logout));
        assert!(!api.session().is_valid());
        assert_eq!(mock.calls()[0].authorization.as_deref(), Some("Bearer tok"));
    }
}
