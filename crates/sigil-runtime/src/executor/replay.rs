//! Replay executor — stateless, one request per turn.

use std::sync::Arc;

use async_trait::async_trait;
use sigil_llm::Provider;
use sigil_storage::Store;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::EngineError;
use crate::executor::{ParsedEventStream, TurnExecutor, TurnInput};
use crate::parser::parse_fragments;

/// Stateless executor: every turn reconstructs the full message list from
/// the persistence collaborator and issues one streamed request. No
/// connection state survives between turns.
pub struct ReplayExecutor {
    provider: Arc<dyn Provider>,
    store: Arc<dyn Store>,
    conversation_id: String,
    cancel: CancellationToken,
}

impl ReplayExecutor {
    /// Create a replay executor for one conversation.
    #[must_use]
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn Store>,
        conversation_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            store,
            conversation_id: conversation_id.into(),
            cancel,
        }
    }
}

#[async_trait]
impl TurnExecutor for ReplayExecutor {
    async fn advance(&mut self, input: TurnInput) -> Result<ParsedEventStream, EngineError> {
        // The engine persists the query and tool results before each turn,
        // so the stored history already carries this input's text.
        debug!(
            conversation_id = %self.conversation_id,
            input = input.describe(),
            "replay turn: rebuilding conversation"
        );
        let messages = self.store.load_messages(&self.conversation_id, None).await?;
        let fragments = self.provider.stream(&messages).await?;
        Ok(Box::pin(parse_fragments(fragments, self.cancel.clone())))
    }
}
