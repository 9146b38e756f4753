//! One question/answer exchange at a time
//!
//! `begin` moves an exchange from Idle through Submitting to AwaitingAnswer: it appends the
//! user's question and a pending assistant placeholder, then hands back a ticket naming that
//! placeholder. The caller runs the request however it likes and passes the outcome to
//! `finish`, which patches exactly the ticket's placeholder. If the ledger was cleared in the
//! meantime the patch lands nowhere and the exchange is dropped.

use crate::api::{QuestionRequest, QuestionResponse};
use crate::document::{Document, DocumentId};
use crate::error::ApiError;
use crate::id::MessageId;
use crate::ledger::{ChatRole, MessageLedger, MessagePatch};
use tracing::{info, warn};

/// Content of the assistant placeholder while the answer is outstanding
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// Content written into the placeholder when the service fails
pub const ANSWER_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error processing your question. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeState {
    #[default]
    Idle,
    Submitting,
    AwaitingAnswer,
    Resolved,
    Failed,
}

/// Handle for the outstanding exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeTicket {
    pub document_id: DocumentId,
    pub question: String,
    pub user_message_id: MessageId,
    pub placeholder_id: MessageId,
}

impl ExchangeTicket {
    pub fn request(&self) -> QuestionRequest {
        QuestionRequest {
            document_id: self.document_id,
            question: self.question.clone(),
        }
    }
}

/// Where a finished exchange ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Resolved,
    Failed,
    /// The placeholder was no longer in the ledger, or the ticket was stale
    Dropped,
}

/// Retrieval figures reported with the last successful answer
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerStats {
    pub document_id: DocumentId,
    pub context_chunks_used: u32,
    pub response_time_seconds: f64,
    pub conversation_id: i64,
}

#[derive(Debug, Default)]
pub struct Orchestrator {
    outstanding: Option<ExchangeTicket>,
    state: ExchangeState,
    last_answer: Option<AnswerStats>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from submission until the outstanding exchange is finished
    pub fn is_busy(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn last_answer(&self) -> Option<&AnswerStats> {
        self.last_answer.as_ref()
    }

    /// Start an exchange. Returns None, touching nothing, when the question is blank, no
    /// processed document is active, or another exchange is still outstanding.
    pub fn begin(
        &mut self,
        ledger: &mut MessageLedger,
        active: Option<&Document>,
        question: &str,
    ) -> Option<ExchangeTicket> {
        let question = question.trim();
        if question.is_empty() || self.is_busy() {
            return None;
        }
        let document = active.filter(|d| d.is_selectable())?;

        self.state = ExchangeState::Submitting;
        let user_message_id = ledger.append(ChatRole::User, question, false);

        let placeholder_id = ledger.append(ChatRole::Assistant, THINKING_PLACEHOLDER, true);
        self.state = ExchangeState::AwaitingAnswer;

        let ticket = ExchangeTicket {
            document_id: document.id,
            question: question.to_string(),
            user_message_id,
            placeholder_id,
        };
        info!(document_id = %ticket.document_id, placeholder = %ticket.placeholder_id, "question submitted");

        self.outstanding = Some(ticket.clone());
        Some(ticket)
    }

    /// Resolve the exchange named by `ticket` with the service's result
    pub fn finish(
        &mut self,
        ledger: &mut MessageLedger,
        ticket: &ExchangeTicket,
        result: Result<QuestionResponse, ApiError>,
    ) -> ExchangeOutcome {
        if self.outstanding.as_ref() != Some(ticket) {
            warn!(placeholder = %ticket.placeholder_id, "finish for an exchange that is not outstanding");
            return ExchangeOutcome::Dropped;
        }
        self.outstanding = None;

        let (patch, terminal, stats) = match result {
            Ok(response) => {
                let stats = AnswerStats {
                    document_id: response.document_id,
                    context_chunks_used: response.context_chunks_used,
                    response_time_seconds: response.response_time_seconds,
                    conversation_id: response.conversation_id,
                };
                (MessagePatch::resolved(response.answer), ExchangeState::Resolved, Some(stats))
            }
            Err(e) => {
                warn!(error = %e, timeout = e.is_timeout(), "question failed");
                (MessagePatch::resolved(ANSWER_ERROR_MESSAGE), ExchangeState::Failed, None)
            }
        };
        // Nothing is reported for an answer that no longer has a placeholder to land in
        if !ledger.patch(&ticket.placeholder_id, patch) {
            info!(placeholder = %ticket.placeholder_id, "conversation changed before the answer arrived");
            self.state = ExchangeState::Idle;
            return ExchangeOutcome::Dropped;
        }
        self.state = terminal;
        if let Some(stats) = stats {
            self.last_answer = Some(stats);
        }

        match terminal {
            ExchangeState::Resolved => ExchangeOutcome::Resolved,
            _ => ExchangeOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::document::tests::doc;

    fn answer(text: &str) -> QuestionResponse {
        QuestionResponse {
            answer: text.to_string(),
            question: "What is X?".to_string(),
            document_id: DocumentId(2),
            context_chunks_used: 3,
            response_time_seconds: 1.25,
            conversation_id: 11,
        }
    }

    #[test]
    fn test_begin_appends_question_and_placeholder() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();
        let active = doc(2, true);

        let ticket = orchestrator
            .begin(&mut ledger, Some(&active), "  What is X?  ")
            .unwrap();

        assert_eq!(ticket.question, "What is X?");
        assert_eq!(ticket.request().document_id, DocumentId(2));
        assert_eq!(orchestrator.state(), ExchangeState::AwaitingAnswer);
        assert!(orchestrator.is_busy());

        let messages = ledger.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "What is X?");
        assert!(!messages[0].pending);
        assert_eq!(messages[1].id, ticket.placeholder_id);
        assert_eq!(messages[1].content, THINKING_PLACEHOLDER);
        assert!(messages[1].pending);
    }

    #[test]
    fn test_begin_ignores_blank_question_or_missing_document() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();

        assert!(orchestrator.begin(&mut ledger, Some(&doc(2, true)), "   ").is_none());
        assert!(orchestrator.begin(&mut ledger, None, "What is X?").is_none());
        assert!(orchestrator.begin(&mut ledger, Some(&doc(1, false)), "What is X?").is_none());
        assert!(ledger.is_empty());
        assert_eq!(orchestrator.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_second_submission_while_outstanding_is_ignored() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();
        let active = doc(2, true);

        orchestrator.begin(&mut ledger, Some(&active), "first").unwrap();
        assert!(orchestrator.begin(&mut ledger, Some(&active), "second").is_none());
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn test_finish_success_patches_placeholder() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();
        let ticket = orchestrator
            .begin(&mut ledger, Some(&doc(2, true)), "What is X?")
            .unwrap();

        let outcome = orchestrator.finish(&mut ledger, &ticket, Ok(answer("X is Y")));

        assert_eq!(outcome, ExchangeOutcome::Resolved);
        assert_eq!(orchestrator.state(), ExchangeState::Resolved);
        assert!(!orchestrator.is_busy());
        assert_eq!(ledger.messages()[1].content, "X is Y");
        assert_eq!(ledger.pending_count(), 0);
        assert_eq!(orchestrator.last_answer().unwrap().context_chunks_used, 3);
    }

    #[test]
    fn test_finish_failure_writes_apology() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();
        let ticket = orchestrator
            .begin(&mut ledger, Some(&doc(2, true)), "What is X?")
            .unwrap();

        let outcome = orchestrator.finish(
            &mut ledger,
            &ticket,
            Err(ApiError::Status {
                status: 500,
                detail: "Failed to process question".to_string(),
            }),
        );

        assert_eq!(outcome, ExchangeOutcome::Failed);
        assert_eq!(orchestrator.state(), ExchangeState::Failed);
        assert_eq!(ledger.messages()[1].content, ANSWER_ERROR_MESSAGE);
        assert!(!ledger.messages()[1].pending);
    }

    #[test]
    fn test_finish_after_clear_is_dropped() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();
        let ticket = orchestrator
            .begin(&mut ledger, Some(&doc(2, true)), "What is X?")
            .unwrap();
        ledger.clear();

        let outcome = orchestrator.finish(&mut ledger, &ticket, Ok(answer("X is Y")));

        assert_eq!(outcome, ExchangeOutcome::Dropped);
        assert!(ledger.is_empty());
        assert!(!orchestrator.is_busy());
        assert_eq!(orchestrator.state(), ExchangeState::Idle);
        assert!(orchestrator.last_answer().is_none());
    }

    #[test]
    fn test_dropped_failure_does_not_report_failed() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();
        let ticket = orchestrator
            .begin(&mut ledger, Some(&doc(2, true)), "What is X?")
            .unwrap();
        ledger.clear();

        let outcome = orchestrator.finish(
            &mut ledger,
            &ticket,
            Err(ApiError::Decode("eof".to_string())),
        );

        assert_eq!(outcome, ExchangeOutcome::Dropped);
        assert_eq!(orchestrator.state(), ExchangeState::Idle);
        assert!(orchestrator.last_answer().is_none());
    }

    #[test]
    fn test_finish_with_stale_ticket_is_dropped() {
        let mut orchestrator = Orchestrator::new();
        let mut ledger = MessageLedger::new();
        let ticket = orchestrator
            .begin(&mut ledger, Some(&doc(2, true)), "What is X?")
            .unwrap();
        orchestrator.finish(&mut ledger, &ticket, Ok(answer("X is Y")));

        let again = orchestrator.finish(&mut ledger, &ticket, Ok(answer("overwritten")));
        assert_eq!(again, ExchangeOutcome::Dropped);
        assert_eq!(ledger.messages()[1].content, "X is Y");
    }

    #[derive(Debug, Clone)]
    enum ExchangeOp {
        Begin { blank: bool },
        Finish { latest: bool, ok: bool },
        Clear,
    }

    fn exchange_op() -> impl Strategy<Value = ExchangeOp> {
        prop_oneof![
            any::<bool>().prop_map(|blank| ExchangeOp::Begin { blank }),
            (any::<bool>(), any::<bool>()).prop_map(|(latest, ok)| ExchangeOp::Finish { latest, ok }),
            Just(ExchangeOp::Clear),
        ]
    }

    proptest! {
        #[test]
        fn test_at_most_one_pending_placeholder(ops in prop::collection::vec(exchange_op(), 0..40)) {
            let mut orchestrator = Orchestrator::new();
            let mut ledger = MessageLedger::new();
            let active = doc(2, true);
            let mut tickets: Vec<ExchangeTicket> = Vec::new();

            for op in ops {
                match op {
                    ExchangeOp::Begin { blank } => {
                        let question = if blank { "   " } else { "What is X?" };
                        if let Some(ticket) = orchestrator.begin(&mut ledger, Some(&active), question) {
                            tickets.push(ticket);
                        }
                    }
                    ExchangeOp::Finish { latest, ok } => {
                        let ticket = if latest { tickets.last() } else { tickets.first() };
                        if let Some(ticket) = ticket.cloned() {
                            let result = if ok {
                                Ok(answer("X is Y"))
                            } else {
                                Err(ApiError::Decode("eof".to_string()))
                            };
                            orchestrator.finish(&mut ledger, &ticket, result);
                        }
                    }
                    ExchangeOp::Clear => ledger.clear(),
                }

                prop_assert!(ledger.pending_count() <= 1);
                // A pending message is always the outstanding exchange's placeholder
                let outstanding = orchestrator.outstanding.as_ref().map(|t| &t.placeholder_id);
                for message in ledger.messages().iter().filter(|m| m.pending) {
                    prop_assert_eq!(Some(&message.id), outstanding);
                }
            }
        }
    }
}
