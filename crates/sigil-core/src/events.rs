//! Protocol events produced by the stream parser and accumulator.
//!
//! An [`Event`] is immutable once emitted. Free-text kinds (think, respond,
//! yield) carry raw content only; call events carry a typed payload of
//! parsed [`Call`]s (or a degraded parse failure), and result events carry
//! the [`ToolResult`] being fed back to the model.

use serde::{Deserialize, Serialize};

use crate::messages::{Call, ToolResult};
use crate::protocol::EventKind;

/// A single semantic event in the protocol stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event kind.
    pub kind: EventKind,
    /// Raw text content. Empty for boundary events (`execute`, `end`).
    pub content: String,
    /// Structured payload for call and result events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

/// Structured payload attached to call and result events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Successfully parsed tool calls.
    Calls {
        /// The parsed calls, in wire order.
        calls: Vec<Call>,
    },
    /// The call content was not valid JSON. The dispatcher converts this
    /// into exactly one error result; it is never dropped or raised.
    CallParseFailure {
        /// The raw content that failed to parse.
        raw: String,
        /// Parse error description.
        error: String,
    },
    /// A tool result being fed back to the model.
    Result {
        /// Identity of the call this result answers.
        call_id: String,
        /// The normalized result.
        result: ToolResult,
    },
}

impl Event {
    /// Create a free-text event.
    #[must_use]
    pub fn text(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            payload: None,
        }
    }

    /// Create a boundary event (`execute` or `end`) with no content.
    #[must_use]
    pub fn boundary(kind: EventKind) -> Self {
        debug_assert!(kind.is_hardstop());
        Self {
            kind,
            content: String::new(),
            payload: None,
        }
    }

    /// Create a call event with parsed calls.
    #[must_use]
    pub fn calls(kind: EventKind, content: impl Into<String>, calls: Vec<Call>) -> Self {
        debug_assert!(kind.is_call());
        Self {
            kind,
            content: content.into(),
            payload: Some(EventPayload::Calls { calls }),
        }
    }

    /// Create a degraded call event whose content failed to parse.
    #[must_use]
    pub fn call_parse_failure(
        kind: EventKind,
        content: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            kind,
            payload: Some(EventPayload::CallParseFailure {
                raw: content.clone(),
                error: error.into(),
            }),
            content,
        }
    }

    /// Create a result event.
    #[must_use]
    pub fn result(call_id: impl Into<String>, result: ToolResult) -> Self {
        Self {
            kind: EventKind::Result,
            content: result.content.clone(),
            payload: Some(EventPayload::Result {
                call_id: call_id.into(),
                result,
            }),
        }
    }

    /// The parsed calls carried by this event, if any.
    #[must_use]
    pub fn parsed_calls(&self) -> Option<&[Call]> {
        match &self.payload {
            Some(EventPayload::Calls { calls }) => Some(calls),
            _ => None,
        }
    }
}
