//! The `Store` trait: the persistence contract the engine consumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigil_core::messages::{Message, Role};
use sigil_core::protocol::EventKind;

/// Errors from the persistence collaborator.
///
/// Never swallowed by the engine: a failing write surfaces to the caller
/// as a raised error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The conversation id is unknown to the store.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Payload serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure (I/O, database, network).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A persisted protocol event with its timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Event content (raw text or serialized payload).
    pub content: String,
    /// UTC time the event was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Options for [`Store::search_messages`].
#[derive(Clone, Debug, Default)]
pub struct SearchOptions<'a> {
    /// Substring to search for (case-insensitive).
    pub query: &'a str,
    /// Restrict to conversations owned by this user.
    pub user_id: &'a str,
    /// Timestamps to exclude from the results (already-seen messages).
    pub exclude_timestamps: &'a [DateTime<Utc>],
    /// Maximum number of matches, newest first.
    pub limit: usize,
}

/// Append-only conversation persistence.
///
/// The conversation log is single-writer per conversation id; appends are
/// idempotent with respect to ordering (no in-place rewrites). Different
/// conversation ids are fully independent.
#[async_trait]
pub trait Store: Send + Sync {
    /// Register a conversation under its owning user. Idempotent; must be
    /// called before the first append for that id.
    async fn open_conversation(&self, conversation_id: &str, user_id: &str)
    -> Result<(), StoreError>;

    /// Append one message to a conversation.
    async fn save_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Append one protocol event to a conversation's event log.
    async fn save_event(
        &self,
        conversation_id: &str,
        kind: EventKind,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Load a conversation's messages in append order. `limit` keeps the
    /// most recent messages when set.
    async fn load_messages(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError>;

    /// Search a user's messages across conversations, newest first.
    async fn search_messages(&self, opts: SearchOptions<'_>) -> Result<Vec<Message>, StoreError>;
}
