use super::{ConversationHistory, DocumentService, QuestionRequest, QuestionResponse};
use crate::document::{Document, DocumentId, DocumentList, UploadFile, UploadResponse, PDF_MEDIA_TYPE};
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[allow(dead_code)]
    message: String,
}

/// HTTP client for the document service
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|_| ApiError::InvalidUrl(base_url.clone()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = error_detail(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            warn!(status = status.as_u16(), %detail, "document service error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// The service reports failures as `{"detail": ...}`; validation errors carry a list there
fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl DocumentService for ApiClient {
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse, ApiError> {
        file.validate()?;

        let url = self.url("/documents/upload");
        debug!(%url, file_name = %file.file_name, bytes = file.bytes.len(), "uploading document");

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(PDF_MEDIA_TYPE)?;
        let form = Form::new().part("file", part);

        let response = self.client.post(&url).multipart(form).send().await?;
        Self::decode(response).await
    }

    async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        let url = self.url("/documents/");
        debug!(%url, "listing documents");

        let response = self.client.get(&url).send().await?;
        let list: DocumentList = Self::decode(response).await?;
        Ok(list.documents)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Document, ApiError> {
        let url = self.url(&format!("/documents/{}", id));
        debug!(%url, "fetching document");

        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn delete_document(&self, id: DocumentId) -> Result<(), ApiError> {
        let url = self.url(&format!("/documents/{}", id));
        debug!(%url, "deleting document");

        let response = self.client.delete(&url).send().await?;
        let _: DeleteResponse = Self::decode(response).await?;
        Ok(())
    }

    async fn ask(&self, request: &QuestionRequest) -> Result<QuestionResponse, ApiError> {
        let url = self.url("/chat/ask");
        debug!(%url, document_id = %request.document_id, "asking question");

        let response = self.client.post(&url).json(request).send().await?;
        Self::decode(response).await
    }

    async fn history(&self, id: DocumentId) -> Result<ConversationHistory, ApiError> {
        let url = self.url(&format!("/chat/history/{}", id));
        debug!(%url, "fetching conversation history");

        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }
}
