//! Conversation messages, tool calls, and tool results.
//!
//! Messages are the append-only conversation record: one [`Message`] per
//! user query, assistant response, or tool result, ordered per conversation
//! id. A [`Call`] is parsed from JSON embedded in a call event's content;
//! a [`ToolResult`] is the normalized outcome fed back to the model —
//! including failures, which are data here, never exceptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::events::{Event, EventPayload};
use crate::protocol::{DELIM_EXECUTE, EventKind};

// ─────────────────────────────────────────────────────────────────────────────
// Roles and messages
// ─────────────────────────────────────────────────────────────────────────────

/// Conversation role of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The querying user.
    User,
    /// The model.
    Assistant,
    /// A tool result.
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
            Self::Tool => f.write_str("tool"),
        }
    }
}

/// One conversation record. Created once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the content.
    pub role: Role,
    /// Raw content. For assistant messages this is protocol text; for tool
    /// messages it is the serialized [`ToolResult`].
    pub content: String,
    /// UTC creation time.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current UTC time.
    #[must_use]
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calls
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Engine-assigned identity, used to re-associate results with calls
    /// when dispatch completes out of order.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Tool arguments (JSON object).
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Call {
    /// Create a call with a fresh v7 id.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            args,
        }
    }
}

/// Wire form of a call: `{"name": <string>, "args": <object>}`.
#[derive(Debug, Deserialize)]
struct CallWire {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

/// Parse the content of a call event into calls.
///
/// Accepts a JSON array of call objects, a single object, or
/// newline-delimited objects. Returns `Err` with a description when nothing
/// parses — the caller degrades that into a single error result, it is
/// never raised.
pub fn parse_calls(content: &str) -> Result<Vec<Call>, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("empty call content".into());
    }

    // Array form first: `[{...}, {...}]`.
    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Vec<CallWire>>(trimmed) {
            Ok(wires) => Ok(wires
                .into_iter()
                .map(|w| Call::new(w.name, w.args))
                .collect()),
            Err(e) => Err(e.to_string()),
        };
    }

    // Single object form.
    if let Ok(wire) = serde_json::from_str::<CallWire>(trimmed) {
        return Ok(vec![Call::new(wire.name, wire.args)]);
    }

    // Newline-delimited objects. All lines must parse; a partial batch
    // would silently drop calls.
    let mut calls = Vec::new();
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CallWire>(line) {
            Ok(wire) => calls.push(Call::new(wire.name, wire.args)),
            Err(e) => return Err(format!("invalid call object {line:?}: {e}")),
        }
    }
    if calls.is_empty() {
        Err("no call objects found".into())
    } else {
        Ok(calls)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool results
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized outcome of a tool call.
///
/// `error = true` covers tool-not-found, invalid arguments, tool-internal
/// failure, and malformed call payloads. It is a normal, storable value:
/// the model sees it as result content and can adapt within the same task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Short human-readable summary, always present.
    pub outcome: String,
    /// Detailed content.
    pub content: String,
    /// Whether the call failed.
    pub error: bool,
}

impl ToolResult {
    /// Create a successful result.
    #[must_use]
    pub fn ok(outcome: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            content: content.into(),
            error: false,
        }
    }

    /// Create a failed result.
    #[must_use]
    pub fn error(outcome: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            content: content.into(),
            error: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcript rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Rebuild assistant protocol text from one turn's accumulated events.
///
/// Free-text and call segments are re-prefixed with their delimiters. When
/// the turn invoked tools, the text gains a trailing `§EXECUTE` marker so
/// the stored transcript is unambiguous to a future reader — the next
/// message in the conversation is then the tool result.
#[must_use]
pub fn render_assistant_transcript(events: &[Event], executed: bool) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(events.len() + 1);
    for ev in events {
        match ev.kind {
            EventKind::Think
            | EventKind::Respond
            | EventKind::Yield
            | EventKind::Call
            | EventKind::Calls => {
                let delim = ev.kind.delimiter().unwrap_or_default();
                segments.push(format!("{delim} {}", ev.content.trim_end()));
            }
            EventKind::End => segments.push(ev.kind.delimiter().unwrap_or_default().to_owned()),
            // Execute markers are re-added below; results are separate
            // messages, not assistant text.
            EventKind::Execute | EventKind::Result => {}
        }
    }
    if executed {
        segments.push(DELIM_EXECUTE.to_owned());
    }
    segments.join("\n")
}

/// Extract every parsed call from one turn's events, in wire order.
#[must_use]
pub fn collect_calls(events: &[Event]) -> Vec<Call> {
    events
        .iter()
        .filter_map(|ev| match &ev.payload {
            Some(EventPayload::Calls { calls }) => Some(calls.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_single_object() {
        let calls = parse_calls(r#"{"name": "search", "args": {"query": "rust"}}"#).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].args["query"], json!("rust"));
        assert!(!calls[0].id.is_empty());
    }

    #[test]
    fn parse_missing_args_defaults_empty() {
        let calls = parse_calls(r#"{"name": "list_files"}"#).unwrap();
        assert!(calls[0].args.is_empty());
    }

    #[test]
    fn parse_array_form() {
        let calls = parse_calls(
            r#"[{"name": "read_file", "args": {"path": "a"}}, {"name": "search", "args": {}}]"#,
        )
        .unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[1].name, "search");
    }

    #[test]
    fn parse_newline_delimited() {
        let content = "{\"name\": \"a\", \"args\": {}}\n{\"name\": \"b\", \"args\": {}}";
        let calls = parse_calls(content).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].name, "b");
    }

    #[test]
    fn parse_invalid_json_is_err_not_panic() {
        assert!(parse_calls(r#"{"name":"tool", invalid: }"#).is_err());
        assert!(parse_calls("").is_err());
        assert!(parse_calls("not json at all").is_err());
    }

    #[test]
    fn parse_partial_batch_fails_whole() {
        let content = "{\"name\": \"a\", \"args\": {}}\n{broken";
        assert!(parse_calls(content).is_err());
    }

    #[test]
    fn call_ids_are_unique() {
        let calls =
            parse_calls("{\"name\": \"a\", \"args\": {}}\n{\"name\": \"a\", \"args\": {}}").unwrap();
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn tool_result_wire_format() {
        let r = ToolResult::error("tool not found", "no tool named frobnicate");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["outcome"], "tool not found");
        assert_eq!(json["error"], true);
        let back: ToolResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn transcript_without_calls() {
        let events = vec![
            Event::text(EventKind::Think, "consider\n"),
            Event::text(EventKind::Respond, "done\n"),
            Event::boundary(EventKind::End),
        ];
        let text = render_assistant_transcript(&events, false);
        assert_eq!(text, "§THINK consider\n§RESPOND done\n§END");
    }

    #[test]
    fn transcript_with_execute_marker() {
        let raw = r#"{"name":"search","args":{}}"#;
        let events = vec![
            Event::text(EventKind::Think, "need data"),
            Event::calls(EventKind::Calls, raw, vec![Call::new("search", Map::new())]),
        ];
        let text = render_assistant_transcript(&events, true);
        assert!(text.ends_with(DELIM_EXECUTE));
        assert!(text.contains("§CALLS"));
    }

    #[test]
    fn transcript_skips_results() {
        let events = vec![
            Event::text(EventKind::Respond, "ok"),
            Event::result("c-1", ToolResult::ok("done", "detail")),
        ];
        let text = render_assistant_transcript(&events, false);
        assert!(!text.contains("detail"));
    }

    #[test]
    fn collect_calls_flattens_batches() {
        let events = vec![
            Event::calls(
                EventKind::Calls,
                "",
                vec![Call::new("a", Map::new()), Call::new("b", Map::new())],
            ),
            Event::text(EventKind::Respond, "x"),
            Event::calls(EventKind::Call, "", vec![Call::new("c", Map::new())]),
        ];
        let calls = collect_calls(&events);
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn message_roles_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::Tool.to_string(), "tool");
    }
}
