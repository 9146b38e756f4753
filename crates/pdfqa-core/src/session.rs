//! The session: active document, its conversation, and the exchange in flight
//!
//! `Session` is the only thing that mutates the registry, the ledger and the orchestrator, so
//! the rule tying them together lives here: whenever the active document changes, the
//! conversation starts over.
//!
//! The async helpers (`refresh`, `upload`, `delete`, `ask`) await the service while holding
//! the session. A UI that must stay responsive runs the request itself and feeds the result
//! back through `apply_refresh`, `complete_upload` or `finish_exchange`.

use crate::api::{DocumentService, QuestionResponse};
use crate::document::{Document, DocumentId, UploadFile, UploadResponse};
use crate::error::{ApiError, SessionError};
use crate::exchange::{AnswerStats, ExchangeOutcome, ExchangeState, ExchangeTicket, Orchestrator};
use crate::ledger::MessageLedger;
use crate::registry::{ActiveChange, DocumentRegistry};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct Session {
    registry: DocumentRegistry,
    ledger: MessageLedger,
    orchestrator: Orchestrator,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &MessageLedger {
        &self.ledger
    }

    pub fn active_document(&self) -> Option<&Document> {
        self.registry.active()
    }

    pub fn is_busy(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn exchange_state(&self) -> ExchangeState {
        self.orchestrator.state()
    }

    pub fn last_answer(&self) -> Option<&AnswerStats> {
        self.orchestrator.last_answer()
    }

    /// Install a fresh document listing
    pub fn apply_refresh(&mut self, documents: Vec<Document>) -> ActiveChange {
        let change = self.registry.replace(documents);
        if change.changed() {
            self.ledger.clear();
        }
        change
    }

    /// Fetch the listing from the service. On failure nothing changes.
    pub async fn refresh(&mut self, service: &dyn DocumentService) -> Result<&[Document], ApiError> {
        let documents = service.list_documents().await.map_err(|e| {
            warn!(error = %e, "document refresh failed");
            e
        })?;
        self.apply_refresh(documents);
        Ok(self.registry.documents())
    }

    /// Make `id` the chat target and start a new conversation, even if it was already active
    pub fn select(&mut self, id: DocumentId) -> Result<(), SessionError> {
        let document = self.registry.select(id)?;
        info!(document_id = %id, name = %document.display_name(), "document selected");
        self.ledger.clear();
        Ok(())
    }

    /// Upload a file, refresh, and select the new document when it is already processed
    pub async fn upload(
        &mut self,
        service: &dyn DocumentService,
        file: UploadFile,
    ) -> Result<Document, ApiError> {
        let (response, documents) = submit_upload(service, &file).await?;
        match self.complete_upload(&response, documents) {
            Some(document) => Ok(document),
            None => service.get_document(response.document_id).await,
        }
    }

    /// Second half of an upload: install the listing fetched after the upload finished.
    /// Returns the uploaded document when the listing contains it.
    pub fn complete_upload(
        &mut self,
        response: &UploadResponse,
        documents: Vec<Document>,
    ) -> Option<Document> {
        self.apply_refresh(documents);

        let document = self.registry.get(response.document_id)?.clone();
        if document.is_selectable() {
            if let Err(e) = self.select(document.id) {
                warn!(error = %e, "could not select uploaded document");
            }
        } else {
            info!(document_id = %document.id, "uploaded document is still processing");
        }
        Some(document)
    }

    /// Delete on the service, then refresh so the registry reflects it
    pub async fn delete(&mut self, service: &dyn DocumentService, id: DocumentId) -> Result<(), ApiError> {
        service.delete_document(id).await?;
        info!(document_id = %id, "document deleted");
        self.refresh(service).await?;
        Ok(())
    }

    pub fn begin_exchange(&mut self, question: &str) -> Option<ExchangeTicket> {
        self.orchestrator
            .begin(&mut self.ledger, self.registry.active(), question)
    }

    pub fn finish_exchange(
        &mut self,
        ticket: &ExchangeTicket,
        result: Result<QuestionResponse, ApiError>,
    ) -> ExchangeOutcome {
        self.orchestrator.finish(&mut self.ledger, ticket, result)
    }

    /// Run a whole exchange against `service`. None when the submission was ignored.
    pub async fn ask(
        &mut self,
        service: &dyn DocumentService,
        question: &str,
    ) -> Option<ExchangeOutcome> {
        let ticket = self.begin_exchange(question)?;
        let result = service.ask(&ticket.request()).await;
        Some(self.finish_exchange(&ticket, result))
    }
}

/// Network half of an upload: validate, upload, then list. Safe to run on a background task.
pub async fn submit_upload(
    service: &dyn DocumentService,
    file: &UploadFile,
) -> Result<(UploadResponse, Vec<Document>), ApiError> {
    file.validate()?;

    let response = service.upload(file).await.map_err(|e| {
        warn!(error = %e, file_name = %file.file_name, "upload failed");
        e
    })?;
    info!(document_id = %response.document_id, message = %response.message, "upload accepted");

    let documents = service.list_documents().await?;
    Ok((response, documents))
}
