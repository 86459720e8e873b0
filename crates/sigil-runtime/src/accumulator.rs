//! Event accumulator — merges parser fragments into complete semantic events.
//!
//! Wraps the parser's raw event sequence in one of two modes:
//!
//! - `chunks = true`: every parser event passes through unmodified, for
//!   fine-grained live display.
//! - `chunks = false`: consecutive events of the same kind coalesce into
//!   one event with concatenated content. The open buffer flushes on a kind
//!   change, on a call/execute/end boundary, and on source exhaustion.
//!   Call-kind runs get their content parsed into typed `Call` payloads
//!   when flushed; a failed parse degrades to a `CallParseFailure` payload
//!   that the dispatch path converts into exactly one error result — never
//!   dropped, never raised.
//!
//! The accumulator also owns **execute synthesis**: when a call is followed
//! (after dispatch) by its matching result, one `execute` event is placed
//! between them — unless the parser already delivered a literal `§EXECUTE`
//! boundary for this turn. A call whose result never arrives (source ended
//! first) synthesizes nothing.

use sigil_core::events::Event;
use sigil_core::messages::{ToolResult, parse_calls};
use sigil_core::protocol::EventKind;

/// Coalescing accumulator over parser events.
#[derive(Debug)]
pub struct Accumulator {
    chunks: bool,
    /// Open same-kind run: kind plus concatenated content.
    open: Option<(EventKind, String)>,
    /// A call event has been emitted and awaits its result.
    pending_call: bool,
    /// An execute boundary (parsed or synthesized) was already emitted.
    execute_emitted: bool,
}

impl Accumulator {
    /// Create an accumulator. `chunks = true` disables coalescing.
    #[must_use]
    pub fn new(chunks: bool) -> Self {
        Self {
            chunks,
            open: None,
            pending_call: false,
            execute_emitted: false,
        }
    }

    /// Feed one parser event, returning the completed events it produces.
    pub fn push(&mut self, ev: Event) -> Vec<Event> {
        if self.chunks {
            self.note_boundaries(&ev);
            return vec![ev];
        }

        match ev.kind {
            EventKind::Execute | EventKind::End => {
                let mut out = self.flush();
                self.note_boundaries(&ev);
                out.push(ev);
                out
            }
            kind => match &mut self.open {
                Some((open_kind, content)) if *open_kind == kind => {
                    content.push_str(&ev.content);
                    Vec::new()
                }
                _ => {
                    let mut out = self.flush();
                    self.open = Some((kind, ev.content));
                    out
                }
            },
        }
    }

    /// Feed a dispatched tool result, synthesizing the `execute` boundary
    /// between a call and its first result when the parser did not already
    /// deliver one.
    pub fn push_result(&mut self, call_id: &str, result: ToolResult) -> Vec<Event> {
        let mut out = self.flush();
        if self.pending_call && !self.execute_emitted {
            out.push(Event::boundary(EventKind::Execute));
            self.execute_emitted = true;
        }
        out.push(Event::result(call_id, result));
        out
    }

    /// Signal source exhaustion, flushing any open run.
    pub fn finish(&mut self) -> Vec<Event> {
        self.flush()
    }

    /// Whether a call event has been emitted with no result yet.
    #[must_use]
    pub fn has_pending_call(&self) -> bool {
        self.pending_call
    }

    /// Flush the open run into at most one completed event.
    fn flush(&mut self) -> Vec<Event> {
        let Some((kind, content)) = self.open.take() else {
            return Vec::new();
        };
        let ev = if kind.is_call() {
            self.pending_call = true;
            match parse_calls(&content) {
                Ok(calls) => Event::calls(kind, content, calls),
                Err(error) => Event::call_parse_failure(kind, content, error),
            }
        } else {
            Event::text(kind, content)
        };
        vec![ev]
    }

    /// Track call/execute boundaries without altering the event.
    fn note_boundaries(&mut self, ev: &Event) {
        match ev.kind {
            EventKind::Call | EventKind::Calls => self.pending_call = true,
            EventKind::Execute => self.execute_emitted = true,
            _ => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sigil_core::events::EventPayload;

    fn feed(acc: &mut Accumulator, events: Vec<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        for ev in events {
            out.extend(acc.push(ev));
        }
        out.extend(acc.finish());
        out
    }

    #[test]
    fn coalesces_same_kind_runs() {
        let mut acc = Accumulator::new(false);
        let out = feed(
            &mut acc,
            vec![
                Event::text(EventKind::Think, "a "),
                Event::text(EventKind::Think, "b "),
                Event::text(EventKind::Think, "c"),
                Event::text(EventKind::Respond, "x "),
                Event::text(EventKind::Respond, "y"),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, EventKind::Think);
        assert_eq!(out[0].content, "a b c");
        assert_eq!(out[1].kind, EventKind::Respond);
        assert_eq!(out[1].content, "x y");
    }

    #[test]
    fn end_boundary_flushes_open_run() {
        let mut acc = Accumulator::new(false);
        let out = feed(
            &mut acc,
            vec![
                Event::text(EventKind::Respond, "done"),
                Event::boundary(EventKind::End),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "done");
        assert_eq!(out[1].kind, EventKind::End);
    }

    #[test]
    fn chunks_mode_passes_through() {
        let mut acc = Accumulator::new(true);
        let events = vec![
            Event::text(EventKind::Think, "a"),
            Event::text(EventKind::Think, "b"),
        ];
        let mut out = Vec::new();
        for ev in events.clone() {
            out.extend(acc.push(ev));
        }
        out.extend(acc.finish());
        assert_eq!(out, events);
    }

    #[test]
    fn call_content_parses_into_payload() {
        let mut acc = Accumulator::new(false);
        let out = feed(
            &mut acc,
            vec![
                Event::text(EventKind::Calls, "{\"name\":\"search\","),
                Event::text(EventKind::Calls, "\"args\":{\"q\":\"rust\"}}"),
            ],
        );
        assert_eq!(out.len(), 1);
        let calls = out[0].parsed_calls().expect("parsed");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
    }

    #[test]
    fn malformed_call_degrades_not_panics() {
        let mut acc = Accumulator::new(false);
        let out = feed(
            &mut acc,
            vec![Event::text(EventKind::Call, "{\"name\":\"tool\", invalid: }")],
        );
        assert_eq!(out.len(), 1);
        assert_matches!(
            out[0].payload,
            Some(EventPayload::CallParseFailure { .. })
        );
        assert!(acc.has_pending_call());
    }

    #[test]
    fn synthesizes_execute_between_call_and_result() {
        let mut acc = Accumulator::new(false);
        let mut out = Vec::new();
        out.extend(acc.push(Event::text(EventKind::Call, "{\"name\":\"search\"}")));
        out.extend(acc.finish());
        out.extend(acc.push_result("c-1", ToolResult::ok("searched", "3 hits")));

        let kinds: Vec<EventKind> = out.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [EventKind::Call, EventKind::Execute, EventKind::Result]);
    }

    #[test]
    fn parser_execute_suppresses_synthesis() {
        let mut acc = Accumulator::new(false);
        let mut out = Vec::new();
        out.extend(acc.push(Event::text(EventKind::Call, "{\"name\":\"search\"}")));
        out.extend(acc.push(Event::boundary(EventKind::Execute)));
        out.extend(acc.push_result("c-1", ToolResult::ok("searched", "3 hits")));

        let kinds: Vec<EventKind> = out.iter().map(|e| e.kind).collect();
        // Exactly one execute, the parsed one.
        assert_eq!(kinds, [EventKind::Call, EventKind::Execute, EventKind::Result]);
    }

    #[test]
    fn no_result_means_no_execute() {
        let mut acc = Accumulator::new(false);
        let out = feed(
            &mut acc,
            vec![Event::text(EventKind::Call, "{\"name\":\"search\"}")],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, EventKind::Call);
        assert!(out.iter().all(|e| e.kind != EventKind::Execute));
        assert!(acc.has_pending_call());
    }

    #[test]
    fn second_result_does_not_re_synthesize() {
        let mut acc = Accumulator::new(false);
        let _ = acc.push(Event::text(EventKind::Call, "{\"name\":\"a\"}"));
        let first = acc.push_result("c-1", ToolResult::ok("done", ""));
        let second = acc.push_result("c-2", ToolResult::ok("done", ""));

        let execs = |evs: &[Event]| {
            evs.iter().filter(|e| e.kind == EventKind::Execute).count()
        };
        assert_eq!(execs(&first), 1);
        assert_eq!(execs(&second), 0);
    }

    #[test]
    fn multiple_runs_between_boundaries() {
        let mut acc = Accumulator::new(false);
        let out = feed(
            &mut acc,
            vec![
                Event::text(EventKind::Think, "t1 "),
                Event::text(EventKind::Think, "t2"),
                Event::text(EventKind::Respond, "r"),
                Event::text(EventKind::Think, "t3"),
            ],
        );
        let kinds: Vec<EventKind> = out.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [EventKind::Think, EventKind::Respond, EventKind::Think]);
        assert_eq!(out[0].content, "t1 t2");
        assert_eq!(out[2].content, "t3");
    }
}
