//! Content fingerprints
//!
//! A fingerprint is the lowercase hex SHA-256 of a file's full content and
//! is the deduplication key sent to the server. File names never enter it.

use std::fmt;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of file content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(data: &[u8]) -> Self {
        Self(compute_hash(data))
    }

    /// Hash on the blocking pool, handing the bytes back with their fingerprint
    pub async fn compute(data: Vec<u8>) -> std::io::Result<(Vec<u8>, Self)> {
        tokio::task::spawn_blocking(move || {
            let fingerprint = Self::of(&data);
            (data, fingerprint)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("Task join error: {}", e)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute SHA-256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
