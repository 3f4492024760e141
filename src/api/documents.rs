//! The user's uploaded documents and their annotations

use serde::{Deserialize, Serialize};

use super::TextliftApi;
use crate::error::{ClientError, Step};
use crate::transport::ApiRequest;
use crate::upload::DocumentStatus;

const UPLOADS_PATH: &str = "/api/v1/documents/uploads";
const ANNOTATION_PATH: &str = "/api/v1/annotation/document";

/// One entry of the upload list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPreview {
    pub document_id: String,
    pub document_status: DocumentStatus,

    /// Set once the server has identified the textbook
    #[serde(default)]
    pub text_book_title: Option<String>,
}

impl TextliftApi {
    /// Documents uploaded by the current user
    pub async fn uploads(&self) -> Result<Vec<DocumentPreview>, ClientError> {
        self.transport
            .send_json(Step::ListUploads, ApiRequest::get(UPLOADS_PATH))
            .await
    }

    pub async fn delete_upload(&self, document_id: &str) -> Result<(), ClientError> {
        let path = format!("{}/{}", UPLOADS_PATH, urlencoding::encode(document_id));
        self.transport
            .send(Step::DeleteUpload, ApiRequest::delete(path))
            .await?;

        tracing::info!(document_id = %document_id, "Deleted upload");
        Ok(())
    }

    /// Annotations for a processed document, passed through as JSON
    pub async fn annotations(&self, document_id: &str) -> Result<serde_json::Value, ClientError> {
        let path = format!("{}/{}", ANNOTATION_PATH, urlencoding::encode(document_id));
        self.transport
            .send_json(Step::Annotations, ApiRequest::get(path))
            .await
    }
}
