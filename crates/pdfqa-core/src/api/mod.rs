pub mod client;

pub use client::ApiClient;

use crate::document::{timestamp, Document, DocumentId, UploadFile, UploadResponse};
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /chat/ask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub document_id: DocumentId,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub answer: String,
    pub question: String,
    pub document_id: DocumentId,
    pub context_chunks_used: u32,
    pub response_time_seconds: f64,
    pub conversation_id: i64,
}

/// One stored question/answer pair from `GET /chat/history/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: i64,
    pub document_id: DocumentId,
    pub question: String,
    pub answer: String,
    pub context_chunks_used: u32,
    #[serde(default)]
    pub response_time_seconds: Option<f64>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub conversations: Vec<ConversationRecord>,
    pub total: usize,
    #[serde(default)]
    pub document_filename: Option<String>,
}

/// The external document and question-answering service
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse, ApiError>;

    async fn list_documents(&self) -> Result<Vec<Document>, ApiError>;

    async fn get_document(&self, id: DocumentId) -> Result<Document, ApiError>;

    async fn delete_document(&self, id: DocumentId) -> Result<(), ApiError>;

    async fn ask(&self, request: &QuestionRequest) -> Result<QuestionResponse, ApiError>;

    async fn history(&self, id: DocumentId) -> Result<ConversationHistory, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_request_wire_format() {
        let request = QuestionRequest {
            document_id: DocumentId(2),
            question: "What is X?".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "document_id": 2, "question": "What is X?" })
        );
    }

    #[test]
    fn test_decode_history() {
        let body = r#"{
            "conversations": [
                {
                    "id": 7,
                    "document_id": 2,
                    "question": "What is X?",
                    "answer": "X is Y",
                    "context_chunks_used": 4,
                    "response_time_seconds": null,
                    "created_at": "2025-03-07T15:02:11.000001"
                }
            ],
            "total": 1,
            "document_filename": "paper.pdf"
        }"#;

        let history: ConversationHistory = serde_json::from_str(body).unwrap();
        assert_eq!(history.total, 1);
        assert_eq!(history.conversations[0].answer, "X is Y");
        assert_eq!(history.conversations[0].response_time_seconds, None);
        assert_eq!(history.document_filename.as_deref(), Some("paper.pdf"));
    }
}
