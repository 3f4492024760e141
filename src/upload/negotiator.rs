//! Upload Negotiator
//!
//! Drives one upload through fingerprint, negotiation and (only for new
//! content) transfer and finalize. Holds no per-upload state, so a single
//! negotiator can serve any number of concurrent uploads.
//!
//! Call order is strict: exactly one negotiation, then at most one
//! transfer, then at most one finalize. Nothing is retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ClientError, Step, ValidationError};
use crate::transport::{ApiRequest, AuthenticatedTransport};

use super::fingerprint::Fingerprint;
use super::types::{
    DoneKind, NegotiationRequest, NegotiationResponse, UploadDecision, UploadFile, UploadOutcome,
    UploadPhase, UploadResult, UploadStatus, UploadStatusResponse, FILE_FIELD, MAX_FILE_SIZE,
    PDF_CONTENT_TYPE,
};

const NEGOTIATE_PATH: &str = "/api/v1/upload";

// ============================================================================
// Interest
// ============================================================================

/// Cancellation token for callers that may stop caring about a result
/// (e.g. a view that was closed mid-upload).
///
/// Checked before every step and after every await; once abandoned the
/// negotiator returns [`ClientError::Abandoned`] and reports no further
/// phases.
#[derive(Debug, Clone, Default)]
pub struct Interest {
    abandoned: Arc<AtomicBool>,
}

impl Interest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn ensure(&self) -> Result<(), ClientError> {
        if self.is_abandoned() {
            Err(ClientError::Abandoned)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Negotiator
// ============================================================================

#[derive(Clone)]
pub struct UploadNegotiator {
    transport: AuthenticatedTransport,
    max_file_size: u64,
}

impl UploadNegotiator {
    pub fn new(transport: AuthenticatedTransport) -> Self {
        Self {
            transport,
            max_file_size: MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Upload a file, deduplicating against content the server already has
    pub async fn upload(&self, file: &UploadFile) -> Result<UploadOutcome, ClientError> {
        self.upload_with(file, &Interest::new(), |_| {}).await
    }

    /// Upload with a cancellation token and a phase observer
    pub async fn upload_with<F>(
        &self,
        file: &UploadFile,
        interest: &Interest,
        mut on_phase: F,
    ) -> Result<UploadOutcome, ClientError>
    where
        F: FnMut(&UploadPhase),
    {
        on_phase(&UploadPhase::Idle);

        let result = self.run(file, interest, &mut on_phase).await;

        if let Err(e) = &result {
            if !matches!(e, ClientError::Abandoned) && !interest.is_abandoned() {
                tracing::warn!(
                    file_name = %file.name(),
                    step = ?e.step(),
                    error = %e,
                    "Upload failed"
                );
                on_phase(&UploadPhase::Failed {
                    kind: e.kind(),
                    step: e.step(),
                });
            }
        }

        result
    }

    async fn run<F>(
        &self,
        file: &UploadFile,
        interest: &Interest,
        on_phase: &mut F,
    ) -> Result<UploadOutcome, ClientError>
    where
        F: FnMut(&UploadPhase),
    {
        interest.ensure()?;

        // Metadata only; content is not loaded yet
        file.validate(self.max_file_size)?;

        on_phase(&UploadPhase::Fingerprinting);
        let bytes = file.read().await?;
        interest.ensure()?;

        let size = bytes.len() as u64;
        if size > self.max_file_size {
            // Grew between validation and read
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_file_size,
            }
            .into());
        }
        let (bytes, fingerprint) = Fingerprint::compute(bytes).await?;
        interest.ensure()?;

        tracing::debug!(
            file_name = %file.name(),
            size,
            fingerprint = %fingerprint,
            "Computed upload fingerprint"
        );

        on_phase(&UploadPhase::Negotiating);
        let decision = self.negotiate(&fingerprint, size).await?;

        match decision {
            UploadDecision::CacheHit { document_id } => {
                interest.ensure()?;
                tracing::info!(
                    fingerprint = %fingerprint,
                    document_id = %document_id,
                    "Duplicate file detected - no transfer needed"
                );
                on_phase(&UploadPhase::Done(DoneKind::CacheHit));
                Ok(UploadOutcome::Existing { document_id })
            }
            UploadDecision::CacheHitWait => {
                interest.ensure()?;
                tracing::info!(
                    fingerprint = %fingerprint,
                    "Identical content is already being processed"
                );
                on_phase(&UploadPhase::Done(DoneKind::CacheHitWait));
                Ok(UploadOutcome::InProgress)
            }
            UploadDecision::NewUpload { upload_id } => {
                // An allocated slot must reach finalize, otherwise the server
                // answers CACHE_HIT_WAIT for this content indefinitely. Once
                // abandoned, the run completes silently and reports Abandoned.
                if interest.is_abandoned() {
                    tracing::debug!(upload_id = %upload_id, "Completing abandoned upload");
                } else {
                    on_phase(&UploadPhase::Transferring {
                        upload_id: upload_id.clone(),
                    });
                }
                let content_type = file.content_type().unwrap_or(PDF_CONTENT_TYPE);
                self.transfer(&upload_id, file.name(), content_type, bytes)
                    .await?;

                if !interest.is_abandoned() {
                    on_phase(&UploadPhase::Finalizing {
                        upload_id: upload_id.clone(),
                    });
                }
                let result = self.finalize(&upload_id).await?;
                interest.ensure()?;

                tracing::info!(
                    upload_id = %upload_id,
                    document_id = %result.document_id,
                    document_status = %result.document_status,
                    "Upload finalized"
                );
                on_phase(&UploadPhase::Done(DoneKind::NewUpload));
                Ok(UploadOutcome::Uploaded(result))
            }
        }
    }

    // ========================================================================
    // Protocol Steps
    // ========================================================================

    /// Exchange a fingerprint for a decision
    pub async fn negotiate(
        &self,
        fingerprint: &Fingerprint,
        size_bytes: u64,
    ) -> Result<UploadDecision, ClientError> {
        let body = NegotiationRequest {
            hash: fingerprint.as_str().to_string(),
            size_bytes,
        };
        let request = ApiRequest::post(NEGOTIATE_PATH)
            .with_json(&body)
            .map_err(|source| ClientError::Transport {
                step: Step::Negotiate,
                source,
            })?;

        let response: NegotiationResponse = self.transport.send_json(Step::Negotiate, request).await?;
        let decision = UploadDecision::try_from(response)?;

        tracing::debug!(mode = decision.mode(), "Upload negotiated");
        Ok(decision)
    }

    /// Send the raw file content for an allocated upload slot
    pub async fn transfer(
        &self,
        upload_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError> {
        let size = bytes.len();
        let request = ApiRequest::post(upload_path(upload_id, "file"))
            .with_file(FILE_FIELD, file_name, content_type, bytes);

        self.transport.send(Step::Transfer, request).await?;

        tracing::debug!(upload_id = %upload_id, size, "File bytes transferred");
        Ok(())
    }

    /// Move a transferred upload to its terminal server-side state
    pub async fn finalize(&self, upload_id: &str) -> Result<UploadResult, ClientError> {
        let request = ApiRequest::post(upload_path(upload_id, "finalize"));
        self.transport.send_json(Step::Finalize, request).await
    }

    /// Current server-side status of an upload. Cadence is up to the caller.
    pub async fn poll_status(&self, upload_id: &str) -> Result<UploadStatus, ClientError> {
        let request = ApiRequest::get(upload_path(upload_id, "status"));
        let response: UploadStatusResponse = self.transport.send_json(Step::Status, request).await?;
        Ok(response.upload_status)
    }
}

fn upload_path(upload_id: &str, action: &str) -> String {
    format!("{}/{}/{}", NEGOTIATE_PATH, urlencoding::encode(upload_id), action)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::session::{MemoryStore, SessionMode, SessionStore};
    use crate::transport::mock::MockHttpClient;
    use crate::transport::TransportFailure;
    use crate::upload::{compute_hash, DocumentStatus};
    use serde_json::json;
    use std::time::Duration;

    const PDF: &[u8] = b"%PDF-1.7\nsample document body\n%%EOF";

    fn setup() -> (UploadNegotiator, Arc<MockHttpClient>, Arc<SessionStore>) {
        let mock = Arc::new(MockHttpClient::new());
        let session = Arc::new(SessionStore::new(Arc::new(MemoryStore::new()), SessionMode::Token));
        session.set_session("tok", Duration::from_secs(3600)).unwrap();
        let transport = AuthenticatedTransport::new(mock.clone(), session.clone());
        (UploadNegotiator::new(transport), mock, session)
    }

    fn pdf_file() -> UploadFile {
        UploadFile::from_bytes("paper.pdf", Some(PDF_CONTENT_TYPE), PDF.to_vec())
    }

    #[tokio::test]
    async fn test_cache_hit_skips_transfer() {
        let (negotiator, mock, _) = setup();
        mock.push_json(
            201,
            json!({"uploadMode": "CACHE_HIT", "uploadId": null, "uploadStatus": null, "documentId": "doc-42"}),
        );

        let outcome = negotiator.upload(&pdf_file()).await.unwrap();

        assert_eq!(
            outcome,
            UploadOutcome::Existing { document_id: "doc-42".to_string() }
        );
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path, "/api/v1/upload");
        assert_eq!(
            calls[0].json,
            Some(json!({"hash": compute_hash(PDF), "sizeBytes": PDF.len()}))
        );
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_cache_hit_wait_does_not_loop() {
        let (negotiator, mock, _) = setup();
        mock.push_json(201, json!({"uploadMode": "CACHE_HIT_WAIT", "uploadId": "u7", "status": "UPLOADING"}));

        let outcome = negotiator.upload(&pdf_file()).await.unwrap();

        assert_eq!(outcome, UploadOutcome::InProgress);
        assert_eq!(outcome.document_id(), None);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_new_upload_transfers_then_finalizes() {
        let (negotiator, mock, _) = setup();
        mock.push_json(201, json!({"uploadMode": "NEW_UPLOAD", "uploadId": "u1", "uploadStatus": "PENDING"}));
        mock.push_json(200, json!({"uploadId": "u1", "uploadStatus": "UPLOADED"}));
        mock.push_json(200, json!({"documentId": "doc-7", "documentStatus": "READY"}));

        let mut phases = Vec::new();
        let outcome = negotiator
            .upload_with(&pdf_file(), &Interest::new(), |p| phases.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UploadOutcome::Uploaded(UploadResult {
                document_id: "doc-7".to_string(),
                document_status: DocumentStatus::Ready,
            })
        );
        assert_eq!(
            mock.paths(),
            vec![
                "/api/v1/upload".to_string(),
                "/api/v1/upload/u1/file".to_string(),
                "/api/v1/upload/u1/finalize".to_string(),
            ]
        );
        assert_eq!(mock.calls()[1].file_len, Some(PDF.len()));
        assert_eq!(
            phases,
            vec![
                UploadPhase::Idle,
                UploadPhase::Fingerprinting,
                UploadPhase::Negotiating,
                UploadPhase::Transferring { upload_id: "u1".to_string() },
                UploadPhase::Finalizing { upload_id: "u1".to_string() },
                UploadPhase::Done(DoneKind::NewUpload),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_mode_stops_immediately() {
        let (negotiator, mock, _) = setup();
        mock.push_json(201, json!({"uploadMode": "BOGUS", "uploadId": "u1"}));

        let err = negotiator.upload(&pdf_file()).await.unwrap_err();

        assert!(matches!(err, ClientError::Protocol { step: Step::Negotiate, .. }));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_file_never_reaches_network() {
        let (negotiator, mock, _) = setup();
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("huge.pdf");
        let handle = std::fs::File::create(&path).unwrap();
        handle.set_len(60 * 1024 * 1024).unwrap();

        let file = UploadFile::open(&path).await.unwrap();
        let err = negotiator.upload(&file).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::TooLarge { size, max })
                if size == 60 * 1024 * 1024 && max == MAX_FILE_SIZE
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_content_type_never_reaches_network() {
        let (negotiator, mock, _) = setup();
        let file = UploadFile::from_bytes("scan.png", Some("image/png"), vec![0x89, 0x50, 0x4e, 0x47]);

        let mut phases = Vec::new();
        let err = negotiator
            .upload_with(&file, &Interest::new(), |p| phases.push(p.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(mock.calls().is_empty());
        assert_eq!(
            phases.last(),
            Some(&UploadPhase::Failed { kind: ErrorKind::Validation, step: None })
        );
    }

    #[tokio::test]
    async fn test_transfer_failure_skips_finalize() {
        let (negotiator, mock, session) = setup();
        mock.push_json(201, json!({"uploadMode": "NEW_UPLOAD", "uploadId": "u1"}));
        mock.push_failure(TransportFailure::Network("connection reset".to_string()));

        let err = negotiator.upload(&pdf_file()).await.unwrap_err();

        assert_eq!(err.step(), Some(Step::Transfer));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(mock.calls().len(), 2);
        assert!(session.is_valid(), "network failures keep the session");
    }

    #[tokio::test]
    async fn test_finalize_failure_reports_step() {
        let (negotiator, mock, _) = setup();
        mock.push_json(201, json!({"uploadMode": "NEW_UPLOAD", "uploadId": "u1"}));
        mock.push_json(200, json!({}));
        mock.push_json(409, json!({"detail": "File was not fully UPLOADED!!!"}));

        let err = negotiator.upload(&pdf_file()).await.unwrap_err();

        assert_eq!(err.step(), Some(Step::Finalize));
        assert!(err.to_string().contains("File was not fully UPLOADED"));
    }

    #[tokio::test]
    async fn test_unauthorized_negotiation_clears_session() {
        let (negotiator, mock, session) = setup();
        mock.push_json(401, json!({}));

        let err = negotiator.upload(&pdf_file()).await.unwrap_err();

        assert!(matches!(err, ClientError::Auth { step: Step::Negotiate, status: 401 }));
        assert!(!session.is_valid());
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_interest_still_completes_allocated_slot() {
        let (negotiator, mock, _) = setup();
        mock.push_json(201, json!({"uploadMode": "NEW_UPLOAD", "uploadId": "u1"}));
        mock.push(crate::transport::ApiResponse::new(200, ""));
        mock.push_json(200, json!({"documentId": "doc-1", "documentStatus": "READY"}));

        let interest = Interest::new();
        let watcher = interest.clone();
        let mut phases = Vec::new();
        let err = negotiator
            .upload_with(&pdf_file(), &interest, |p| {
                phases.push(p.clone());
                if *p == UploadPhase::Negotiating {
                    watcher.abandon();
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Abandoned));
        assert_eq!(
            mock.paths(),
            vec!["/api/v1/upload", "/api/v1/upload/u1/file", "/api/v1/upload/u1/finalize"]
        );
        assert_eq!(phases.last(), Some(&UploadPhase::Negotiating));
    }

    #[tokio::test]
    async fn test_abandoned_before_negotiation_sends_nothing() {
        let (negotiator, mock, _) = setup();
        let interest = Interest::new();
        let watcher = interest.clone();

        let err = negotiator
            .upload_with(&pdf_file(), &interest, |p| {
                if *p == UploadPhase::Fingerprinting {
                    watcher.abandon();
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Abandoned));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_cache_hit_reports_abandoned() {
        let (negotiator, mock, _) = setup();
        mock.push_json(200, json!({"uploadMode": "CACHE_HIT", "documentId": "doc-9"}));
        let interest = Interest::new();
        let watcher = interest.clone();
        let mut phases = Vec::new();

        let err = negotiator
            .upload_with(&pdf_file(), &interest, |p| {
                phases.push(p.clone());
                if *p == UploadPhase::Negotiating {
                    watcher.abandon();
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Abandoned));
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(phases.last(), Some(&UploadPhase::Negotiating));
    }

    #[tokio::test]
    async fn test_poll_status() {
        let (negotiator, mock, _) = setup();
        mock.push_json(200, json!({"status": "UPLOADING"}));

        let status = negotiator.poll_status("u 1").await.unwrap();

        assert_eq!(status, UploadStatus::Uploading);
        assert_eq!(mock.paths(), vec!["/api/v1/upload/u%201/status".to_string()]);
    }
}
