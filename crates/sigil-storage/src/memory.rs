//! In-process store backend.
//!
//! Conversations live in a [`DashMap`] keyed by conversation id, so each
//! append locks only its own entry — the single-writer-per-conversation
//! guarantee falls out of per-entry locking, and concurrent conversations
//! never contend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sigil_core::messages::{Message, Role};
use sigil_core::protocol::EventKind;

use crate::store::{SearchOptions, Store, StoreError, StoredEvent};

/// One conversation's append-only log.
#[derive(Debug, Default)]
struct ConversationLog {
    user_id: String,
    messages: Vec<Message>,
    events: Vec<StoredEvent>,
}

/// In-process [`Store`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    conversations: DashMap<String, ConversationLog>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events recorded for a conversation. Zero for unknown ids.
    #[must_use]
    pub fn event_count(&self, conversation_id: &str) -> usize {
        self.conversations
            .get(conversation_id)
            .map_or(0, |log| log.events.len())
    }

    /// Snapshot of a conversation's event log, in append order.
    #[must_use]
    pub fn events(&self, conversation_id: &str) -> Vec<StoredEvent> {
        self.conversations
            .get(conversation_id)
            .map_or_else(Vec::new, |log| log.events.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn open_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), StoreError> {
        let mut log = self.conversations.entry(conversation_id.to_owned()).or_default();
        if log.user_id.is_empty() {
            log.user_id = user_id.to_owned();
        }
        Ok(())
    }

    async fn save_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut log = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_owned()))?;
        log.messages.push(Message {
            role,
            content: content.to_owned(),
            timestamp,
        });
        Ok(())
    }

    async fn save_event(
        &self,
        conversation_id: &str,
        kind: EventKind,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut log = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_owned()))?;
        log.events.push(StoredEvent {
            kind,
            content: content.to_owned(),
            timestamp,
        });
        Ok(())
    }

    async fn load_messages(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError> {
        let log = self
            .conversations
            .get(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_owned()))?;
        let messages = &log.messages;
        let start = limit.map_or(0, |l| messages.len().saturating_sub(l));
        Ok(messages[start..].to_vec())
    }

    async fn search_messages(&self, opts: SearchOptions<'_>) -> Result<Vec<Message>, StoreError> {
        let needle = opts.query.to_lowercase();
        let mut matches: Vec<Message> = self
            .conversations
            .iter()
            .filter(|entry| entry.user_id == opts.user_id)
            .flat_map(|entry| {
                entry
                    .messages
                    .iter()
                    .filter(|m| m.content.to_lowercase().contains(&needle))
                    .filter(|m| !opts.exclude_timestamps.contains(&m.timestamp))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(opts.limit);
        Ok(matches)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
