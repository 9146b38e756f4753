pub mod api;
pub mod config;
pub mod document;
pub mod error;
pub mod exchange;
pub mod id;
pub mod ledger;
pub mod registry;
pub mod session;

// Re-export main types for convenience
pub use api::{ApiClient, ConversationHistory, ConversationRecord, DocumentService, QuestionRequest, QuestionResponse};
pub use config::Config;
pub use document::{format_date, format_file_size, is_valid_pdf, Document, DocumentId, DocumentStatus, UploadFile, UploadResponse};
pub use error::{ApiError, SessionError};
pub use exchange::{AnswerStats, ExchangeOutcome, ExchangeState, ExchangeTicket, ANSWER_ERROR_MESSAGE, THINKING_PLACEHOLDER};
pub use id::{new_id, MessageId};
pub use ledger::{ChatMessage, ChatRole, MessageLedger, MessagePatch};
pub use registry::{ActiveChange, DocumentRegistry};
pub use session::{submit_upload, Session};
