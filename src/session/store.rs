//! Session Store
//!
//! Owns the persisted credential (or cookie-session flag) and its expiry.
//! Every other component reads and clears the session through this type.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::kv::KeyValueStore;
use super::SessionError;

// ============================================================================
// Constants
// ============================================================================

/// Default safety margin: sessions expiring within 30s count as expired
pub const DEFAULT_SKEW: Duration = Duration::from_millis(30_000);

const CREDENTIAL_KEY: &str = "textlift.credential";
const ACTIVE_KEY: &str = "textlift.session_active";
const EXPIRES_AT_KEY: &str = "textlift.expires_at";

/// Persisted HTTP cookies, cleared together with the session
pub const COOKIE_JAR_KEY: &str = "textlift.cookies";

const ACTIVE_FLAG: &str = "1";

// ============================================================================
// Session Types
// ============================================================================

/// How the credential is held on the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Bearer token stored client-side and attached to requests
    Token,
    /// HTTP-only cookie managed by the server; only an "active" flag is stored
    Cookie,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Token => f.write_str("token"),
            SessionMode::Cookie => f.write_str("cookie"),
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(SessionMode::Token),
            "cookie" => Ok(SessionMode::Cookie),
            other => Err(format!("unknown session mode: {}", other)),
        }
    }
}

/// Snapshot of the persisted session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Readable credential. Always `None` in cookie mode.
    pub credential: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Session Store
// ============================================================================

/// Exclusive owner of the client session
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    mode: SessionMode,
    skew: Duration,
}

impl SessionStore {
    /// Create a store backed by the wall clock
    pub fn new(store: Arc<dyn KeyValueStore>, mode: SessionMode) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), mode)
    }

    /// Create a store with an explicit clock
    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, mode: SessionMode) -> Self {
        Self {
            store,
            clock,
            mode,
            skew: DEFAULT_SKEW,
        }
    }

    /// Override the skew used by [`SessionStore::is_valid`]
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Store a session expiring `ttl` from now, replacing any prior one.
    ///
    /// In cookie mode the credential itself lives in the cookie jar and is
    /// not persisted; only the "active" flag is written.
    pub fn set_session(&self, credential: &str, ttl: Duration) -> Result<(), SessionError> {
        let expires_at = self.expiry_from_now(ttl);

        match self.mode {
            SessionMode::Token if credential.is_empty() => {
                return Err(SessionError::CredentialRequired(self.mode));
            }
            SessionMode::Token => {
                self.store.put_all(&[
                    (CREDENTIAL_KEY, credential.to_string()),
                    (EXPIRES_AT_KEY, expires_at.to_string()),
                ])?;
            }
            SessionMode::Cookie => {
                self.store.put_all(&[
                    (ACTIVE_KEY, ACTIVE_FLAG.to_string()),
                    (EXPIRES_AT_KEY, expires_at.to_string()),
                ])?;
            }
        }

        tracing::debug!(mode = %self.mode, expires_at_ms = expires_at, "Session stored");
        Ok(())
    }

    /// Record a cookie-backed session as active for `ttl`
    pub fn mark_active(&self, ttl: Duration) -> Result<(), SessionError> {
        if self.mode != SessionMode::Cookie {
            return Err(SessionError::CredentialRequired(self.mode));
        }
        self.set_session("", ttl)
    }

    /// Remove the session. Clearing an empty session is a no-op.
    pub fn clear_session(&self) {
        if let Err(e) = self
            .store
            .remove_all(&[CREDENTIAL_KEY, ACTIVE_KEY, EXPIRES_AT_KEY, COOKIE_JAR_KEY])
        {
            tracing::warn!(error = %e, "Failed to persist session removal");
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The stored credential, if readable by the client
    pub fn credential(&self) -> Option<String> {
        match self.mode {
            SessionMode::Token => self.store.get(CREDENTIAL_KEY).filter(|c| !c.is_empty()),
            SessionMode::Cookie => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at_ms()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn session(&self) -> Session {
        Session {
            credential: self.credential(),
            expires_at: self.expires_at(),
        }
    }

    /// Validity with the configured skew
    pub fn is_valid(&self) -> bool {
        self.is_valid_with_skew(self.skew)
    }

    /// True iff the session is present and `now + skew < expires_at`
    pub fn is_valid_with_skew(&self, skew: Duration) -> bool {
        if !self.is_present() {
            return false;
        }
        let Some(expires_at) = self.expires_at_ms() else {
            return false;
        };

        let now = self.clock.now().timestamp_millis();
        let skew = i64::try_from(skew.as_millis()).unwrap_or(i64::MAX);
        now.saturating_add(skew) < expires_at
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn is_present(&self) -> bool {
        match self.mode {
            SessionMode::Token => self.credential().is_some(),
            SessionMode::Cookie => self.store.get(ACTIVE_KEY).as_deref() == Some(ACTIVE_FLAG),
        }
    }

    fn expires_at_ms(&self) -> Option<i64> {
        self.store.get(EXPIRES_AT_KEY)?.trim().parse().ok()
    }

    fn expiry_from_now(&self, ttl: Duration) -> i64 {
        let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.clock.now().timestamp_millis().saturating_add(ttl)
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("mode", &self.mode)
            .field("skew", &self.skew)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
