//! Error types for talking to the document service and mutating the session

use crate::document::DocumentId;
use thiserror::Error;

/// Failures at the document service boundary
#[derive(Error, Debug)]
pub enum ApiError {
    /// Rejected locally before any request was made
    #[error("{file_name} is not a PDF. Please select a PDF file.")]
    InvalidFile { file_name: String },

    #[error("Could not read {path}: {message}")]
    File { path: String, message: String },

    /// Connection failure, timeout, or broken response stream
    #[error("Request to document service failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status; `detail` is the service's own message when it sent one
    #[error("Document service returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Unexpected response from document service: {0}")]
    Decode(String),

    #[error("Invalid document service URL '{0}'")]
    InvalidUrl(String),

    /// The task running the request stopped before producing a result
    #[error("Request interrupted: {0}")]
    Interrupted(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport(e) if e.is_timeout())
    }

    /// True when the request never left the client
    pub fn is_input_rejected(&self) -> bool {
        matches!(self, ApiError::InvalidFile { .. } | ApiError::File { .. })
    }
}

/// Rejected session mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Document {0} is not in the registry")]
    UnknownDocument(DocumentId),

    #[error("Document {0} has not finished processing")]
    NotProcessed(DocumentId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        let missing = ApiError::Status {
            status: 404,
            detail: "Document not found".to_string(),
        };
        assert!(missing.is_not_found());
        assert!(!missing.is_timeout());
        assert_eq!(
            missing.to_string(),
            "Document service returned 404: Document not found"
        );
    }

    #[test]
    fn test_input_rejected() {
        let err = ApiError::InvalidFile {
            file_name: "notes.txt".to_string(),
        };
        assert!(err.is_input_rejected());
        assert_eq!(err.to_string(), "notes.txt is not a PDF. Please select a PDF file.");
        assert!(!ApiError::Decode("eof".to_string()).is_input_rejected());
    }
}
