//! Per-session conversation log.
//!
//! A `Session` is the unit of state ownership: each concurrent session
//! gets its own instance, and the active turn is the log's only writer,
//! so no locking is needed inside it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::llm::ChatMessage;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// One entry in the session log.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub author: Author,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// A user session owning its append-only conversation log.
#[derive(Debug, Serialize)]
pub struct Session {
    pub id: Uuid,
    turns: Vec<ConversationTurn>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Author::User, content.into());
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Author::Assistant, content.into());
    }

    fn push(&mut self, author: Author, content: String) {
        self.turns.push(ConversationTurn {
            author,
            content,
            at: Utc::now(),
        });
        self.last_active_at = Utc::now();
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The full transcript as chat messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|turn| match turn.author {
                Author::User => ChatMessage::user(&turn.content),
                Author::Assistant => ChatMessage::assistant(&turn.content),
            })
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
