//! Shared runtime types: operating mode, run requests, stream aliases.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use sigil_core::events::Event;
use tokio_util::sync::CancellationToken;

use crate::errors::EngineError;

/// Operating mode for a run.
///
/// Exhaustive by design: every mode string from the outside world resolves
/// to one of these before the loop starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Stateless: one request per turn, conversation rebuilt from storage.
    Replay,
    /// Stateful: one persistent connection fed tool-result continuations.
    Resume,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replay => f.write_str("replay"),
            Self::Resume => f.write_str("resume"),
        }
    }
}

/// A lazy stream of protocol events. Consumption may stop at any point;
/// dropping the stream cancels the run.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, EngineError>> + Send>>;

/// Parameters for one engine run.
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// The user's query.
    pub query: String,
    /// Owning user id.
    pub user_id: String,
    /// Conversation to append to.
    pub conversation_id: String,
    /// Operating mode.
    pub mode: Mode,
    /// Maximum model round-trips before the run aborts.
    pub max_iterations: u32,
    /// Cooperative cancellation; defaults to a fresh token.
    pub cancel: CancellationToken,
}

impl RunRequest {
    /// Create a request with a fresh cancellation token.
    #[must_use]
    pub fn new(
        query: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        mode: Mode,
        max_iterations: u32,
    ) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            mode,
            max_iterations,
            cancel: CancellationToken::new(),
        }
    }
}
