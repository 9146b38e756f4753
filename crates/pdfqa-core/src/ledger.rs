//! The conversation for the active document
//!
//! An ordered, in-memory log of chat turns. Messages are appended at the end and may later be
//! patched in place; nothing is ever reordered, and a message's id, role and timestamp are
//! fixed at creation. The whole log is discarded when the active document changes.

use crate::id::{new_id, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Placeholder still waiting for its final content
    pub pending: bool,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Fields that may change on an existing message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub pending: Option<bool>,
}

impl MessagePatch {
    /// Final content for a placeholder
    pub fn resolved(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            pending: Some(false),
        }
    }
}

#[derive(Debug, Default)]
pub struct MessageLedger {
    messages: Vec<ChatMessage>,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: ChatRole, content: impl Into<String>, pending: bool) -> MessageId {
        let id = new_id();
        self.messages.push(ChatMessage {
            id: id.clone(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            pending,
        });
        id
    }

    /// Merge `patch` into the message with `id`. Returns false, changing nothing, when the id
    /// is not in the ledger (it may have been cleared while a request was in flight).
    ///
    /// `pending` only ever goes from true to false; a request to set it again is ignored.
    pub fn patch(&mut self, id: &MessageId, patch: MessagePatch) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) else {
            debug!(message_id = %id, "patch for message not in ledger ignored");
            return false;
        };

        if let Some(content) = patch.content {
            message.content = content;
        }
        if patch.pending == Some(false) {
            message.pending = false;
        }
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.pending).count()
    }
}
