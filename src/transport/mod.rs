//! Transport Module
//!
//! HTTP seam for every call the client makes:
//! - `HttpClient`: the raw capability (reqwest in production, mocks in tests)
//! - `AuthenticatedTransport`: attaches the credential to non-public requests
//!   and invalidates the session on 401/403 responses
//! - `PersistentCookieJar`: cookie storage that survives restarts
//!
//! Feature code never touches headers or session storage directly.

pub mod auth;
pub mod client;
pub mod cookies;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use auth::{AuthEvent, AuthenticatedTransport, PUBLIC_PATHS};
pub use client::{HttpClient, ReqwestClient};
pub use cookies::PersistentCookieJar;
pub use types::{ApiRequest, ApiResponse, RequestBody, TransportFailure};
