//! Upload types for the negotiation protocol

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ErrorKind, Step, ValidationError};

// ============================================================================
// Constants
// ============================================================================

/// Maximum file size: 50MB
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// The only content type the service accepts
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Multipart field carrying the file bytes
pub const FILE_FIELD: &str = "file";

// ============================================================================
// Negotiation Types
// ============================================================================

/// Request body for the negotiation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRequest {
    /// Hex SHA-256 of the complete file
    pub hash: String,

    /// Total file size in bytes
    pub size_bytes: u64,
}

/// Negotiation response as sent over the wire.
///
/// Loosely typed on purpose: decode it into [`UploadDecision`] right away.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    pub upload_mode: String,

    /// Meaningful only for `NEW_UPLOAD`
    #[serde(default)]
    pub upload_id: Option<String>,

    #[serde(default, alias = "status")]
    pub upload_status: Option<String>,

    /// Meaningful only for `CACHE_HIT`
    #[serde(default)]
    pub document_id: Option<String>,
}

/// What the server decided for a fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadDecision {
    /// Content already fully processed
    CacheHit { document_id: String },
    /// Identical content is being processed elsewhere; no document yet
    CacheHitWait,
    /// A slot was allocated; bytes must be transferred
    NewUpload { upload_id: String },
}

impl UploadDecision {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::CacheHit { .. } => "CACHE_HIT",
            Self::CacheHitWait => "CACHE_HIT_WAIT",
            Self::NewUpload { .. } => "NEW_UPLOAD",
        }
    }
}

impl TryFrom<NegotiationResponse> for UploadDecision {
    type Error = ClientError;

    fn try_from(response: NegotiationResponse) -> Result<Self, Self::Error> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        match response.upload_mode.as_str() {
            "CACHE_HIT" => present(response.document_id)
                .map(|document_id| Self::CacheHit { document_id })
                .ok_or_else(|| ClientError::protocol(Step::Negotiate, "CACHE_HIT without documentId")),
            "CACHE_HIT_WAIT" => Ok(Self::CacheHitWait),
            "NEW_UPLOAD" => present(response.upload_id)
                .map(|upload_id| Self::NewUpload { upload_id })
                .ok_or_else(|| ClientError::protocol(Step::Negotiate, "NEW_UPLOAD without uploadId")),
            other => Err(ClientError::protocol(
                Step::Negotiate,
                format!("Unknown uploadMode: {:?}", other),
            )),
        }
    }
}

// ============================================================================
// Finalize / Status Types
// ============================================================================

/// Final state of a new upload, returned by the finalize endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub document_id: String,
    pub document_status: DocumentStatus,
}

/// Response of the upload status endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    #[serde(alias = "status")]
    pub upload_status: UploadStatus,
}

/// Server-side document processing status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentStatus {
    Ready,
    AnnotationsGenerating,
    AnnotationsReady,
    Failed,
    Other(String),
}

impl From<String> for DocumentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "READY" => Self::Ready,
            "ANNOTATIONS_GENERATING" => Self::AnnotationsGenerating,
            "ANNOTATIONS_READY" => Self::AnnotationsReady,
            "FAILED" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<DocumentStatus> for String {
    fn from(status: DocumentStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("READY"),
            Self::AnnotationsGenerating => f.write_str("ANNOTATIONS_GENERATING"),
            Self::AnnotationsReady => f.write_str("ANNOTATIONS_READY"),
            Self::Failed => f.write_str("FAILED"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Server-side upload session status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Uploaded,
    Failed,
    Other(String),
}

impl UploadStatus {
    /// Whether the server will not move this upload any further
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Uploaded | Self::Failed)
    }
}

impl From<String> for UploadStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => Self::Pending,
            "UPLOADING" => Self::Uploading,
            "UPLOADED" => Self::Uploaded,
            "FAILED" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<UploadStatus> for String {
    fn from(status: UploadStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("PENDING"),
            Self::Uploading => f.write_str("UPLOADING"),
            Self::Uploaded => f.write_str("UPLOADED"),
            Self::Failed => f.write_str("FAILED"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

// ============================================================================
// Outcome / Phase Types
// ============================================================================

/// Successful end of a negotiator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Already processed; no bytes were sent
    Existing { document_id: String },
    /// Same content in flight elsewhere; poll or retry later
    InProgress,
    /// Bytes transferred and finalized
    Uploaded(UploadResult),
}

impl UploadOutcome {
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::Existing { document_id } => Some(document_id),
            Self::InProgress => None,
            Self::Uploaded(result) => Some(&result.document_id),
        }
    }
}

/// Negotiator state machine.
///
/// `Idle -> Fingerprinting -> Negotiating -> {Done | Transferring -> Finalizing -> Done}`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Fingerprinting,
    Negotiating,
    Transferring { upload_id: String },
    Finalizing { upload_id: String },
    Done(DoneKind),
    Failed { kind: ErrorKind, step: Option<Step> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneKind {
    CacheHit,
    CacheHitWait,
    NewUpload,
}

impl UploadPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed { .. })
    }
}

// ============================================================================
// Upload File
// ============================================================================

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A file selected for upload.
///
/// Path-backed files only know their metadata until [`UploadFile::read`],
/// so size validation never needs the content in memory.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    content_type: Option<String>,
    size: u64,
    source: FileSource,
}

impl UploadFile {
    /// Describe a file on disk. Content type is guessed from the extension.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            name,
            content_type: mime_guess::from_path(path).first().map(|m| m.essence_str().to_string()),
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// In-memory file, e.g. received from a picker
    pub fn from_bytes(name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.filter(|c| !c.is_empty()).map(str::to_string),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Local pre-flight checks against the given size limit
    pub fn validate(&self, max_size: u64) -> Result<(), ValidationError> {
        if self.size > max_size {
            return Err(ValidationError::TooLarge {
                size: self.size,
                max: max_size,
            });
        }
        if let Some(content_type) = &self.content_type {
            if content_type != PDF_CONTENT_TYPE {
                return Err(ValidationError::UnsupportedType(content_type.clone()));
            }
        }
        if self.size == 0 {
            return Err(ValidationError::Empty);
        }
        Ok(())
    }

    /// Load the full content
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
