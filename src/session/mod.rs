//! Session Module
//!
//! Client-side session lifecycle:
//! - Persisted key-value backends (memory, JSON file)
//! - Injectable clock for deterministic expiry checks
//! - `SessionStore`, the only owner of the credential and its expiry
//!
//! Two session shapes are supported behind the same interface: a bearer
//! token readable by the client, or a server-managed HTTP-only cookie where
//! the client only tracks a "session active" flag.

pub mod clock;
pub mod kv;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use store::{Session, SessionMode, SessionStore, COOKIE_JAR_KEY, DEFAULT_SKEW};

/// Session persistence errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to persist session: {0}")]
    Persist(#[from] std::io::Error),

    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("A credential is required in {0} mode")]
    CredentialRequired(SessionMode),
}
