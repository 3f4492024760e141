//! TextLift Client Library
//!
//! Client side of the TextLift document annotation service: session
//! lifecycle, authenticated HTTP transport, and the content-addressed
//! upload negotiation protocol.
//!
//! # Modules
//!
//! - `session`: Persisted session state (credential or cookie flag + expiry)
//! - `transport`: HTTP seam with credential attachment and auth-failure handling
//! - `upload`: SHA-256 fingerprinting and upload negotiation
//! - `guard`: Admission check for protected views
//! - `api`: Typed wrappers over the remaining REST endpoints

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod session;
pub mod transport;
pub mod upload;

pub use api::TextliftApi;
pub use config::Config;
pub use error::{ClientError, ErrorKind, Step, ValidationError};
pub use guard::{Access, RouteGuard};
pub use session::{SessionMode, SessionStore};
pub use transport::{AuthEvent, AuthenticatedTransport, HttpClient, PersistentCookieJar, ReqwestClient};
pub use upload::{UploadDecision, UploadFile, UploadNegotiator, UploadOutcome, UploadResult};
