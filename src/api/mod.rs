//! TextLift service API
//!
//! Typed calls for the endpoints around the upload protocol: account
//! lifecycle and the user's documents. Every call goes through the
//! [`AuthenticatedTransport`], so credential handling stays in one place.

mod auth;
mod documents;

use std::sync::Arc;
use std::time::Duration;

use crate::session::SessionStore;
use crate::transport::AuthenticatedTransport;
use crate::upload::UploadNegotiator;

pub use auth::{LoginRequest, LoginResponse, SignupRequest};
pub use documents::DocumentPreview;

/// Entry point bundling the transport, the session and the uploader
#[derive(Clone)]
pub struct TextliftApi {
    transport: AuthenticatedTransport,
    uploader: UploadNegotiator,
    /// Lifetime assumed when login does not report one
    session_ttl: Duration,
}

impl TextliftApi {
    pub fn new(transport: AuthenticatedTransport, session_ttl: Duration) -> Self {
        Self {
            uploader: UploadNegotiator::new(transport.clone()),
            transport,
            session_ttl,
        }
    }

    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.transport.session()
    }

    pub fn uploader(&self) -> &UploadNegotiator {
        &self.uploader
    }
}
