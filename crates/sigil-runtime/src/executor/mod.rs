//! Turn executors — the two operating modes behind one interface.
//!
//! [`TurnExecutor::advance`] issues one model request and returns the
//! parsed event stream for that turn. [`replay::ReplayExecutor`] rebuilds
//! the conversation from storage on every turn; [`resume::ResumeExecutor`]
//! holds one persistent session and feeds it continuations.

pub mod replay;
pub mod resume;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use sigil_core::events::Event;

use crate::errors::EngineError;

pub use replay::ReplayExecutor;
pub use resume::ResumeExecutor;

/// Input for one turn: the opening query, or the previous turn's tool
/// results folded into continuation text.
#[derive(Clone, Debug)]
pub enum TurnInput {
    /// The user's query, first turn only.
    Query(String),
    /// Serialized tool results feeding the next round-trip.
    ToolResults(String),
}

impl TurnInput {
    /// The raw text carried by this input.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Query(text) | Self::ToolResults(text) => text,
        }
    }

    /// Short label for logging.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::ToolResults(_) => "tool_results",
        }
    }
}

/// Stream of parsed protocol events for one turn.
pub type ParsedEventStream = Pin<Box<dyn Stream<Item = Result<Event, EngineError>> + Send>>;

/// One model round-trip, either mode.
#[async_trait]
pub trait TurnExecutor: Send {
    /// Issue the turn's request and return its parsed event stream.
    async fn advance(&mut self, input: TurnInput) -> Result<ParsedEventStream, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_input_text_access() {
        let q = TurnInput::Query("find it".into());
        assert_eq!(q.text(), "find it");
        assert_eq!(q.describe(), "query");

        let r = TurnInput::ToolResults("[{\"outcome\":\"ok\"}]".into());
        assert_eq!(r.describe(), "tool_results");
    }
}
