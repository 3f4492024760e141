//! Route guard for protected views
//!
//! The guard never navigates itself; it returns [`Access::Redirect`] and
//! leaves the navigation to the presentation layer.

use std::sync::Arc;

use crate::session::SessionStore;

/// Admission decision for a protected view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(String),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: Arc<SessionStore>,
    login_path: String,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self::with_login_path(session, "/login")
    }

    pub fn with_login_path(session: Arc<SessionStore>, login_path: impl Into<String>) -> Self {
        Self {
            session,
            login_path: login_path.into(),
        }
    }

    /// Check the session before entering a protected view.
    ///
    /// An invalid session is cleared before redirecting so an expired
    /// credential does not linger in storage. Safe to call repeatedly.
    pub fn check_access(&self) -> Access {
        if self.session.is_valid() {
            return Access::Allow;
        }

        self.session.clear_session();
        tracing::debug!(redirect_to = %self.login_path, "Session invalid, redirecting");
        Access::Redirect(self.login_path.clone())
    }
}
