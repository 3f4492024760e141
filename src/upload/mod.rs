//! Upload Module (content-addressed negotiation)
//!
//! Uploads a PDF without ever sending content the server already has:
//! - SHA-256 fingerprint computed locally as the deduplication key
//! - Negotiation decides between an existing document, an upload already
//!   in flight elsewhere, or a new upload slot
//!
//! Protocol Flow:
//! 1. Client validates size and content type locally
//! 2. Client sends `{hash, sizeBytes}` to the negotiation endpoint
//! 3. Server answers `CACHE_HIT`, `CACHE_HIT_WAIT` or `NEW_UPLOAD`
//! 4. For `NEW_UPLOAD` only: transfer the bytes, then finalize

pub mod fingerprint;
pub mod negotiator;
pub mod types;

pub use fingerprint::{compute_hash, Fingerprint};
pub use negotiator::{Interest, UploadNegotiator};
pub use types::*;
