//! Stream parser — turns incremental text fragments into typed events.
//!
//! [`StreamParser`] is a pure state machine: each [`push`](StreamParser::push)
//! scans one fragment for protocol delimiters, emits text events of the
//! *current* kind for the content in between, and switches kinds on each
//! match. The current kind defaults to `think` before any delimiter is seen.
//!
//! Two invariants are correctness-critical, not optimizations:
//!
//! - **Hardstop**: once `§END` or `§EXECUTE` is matched, the parser emits
//!   the boundary event, discards the remainder of the fragment, and
//!   refuses all further input. The async driver
//!   [`parse_fragments`] checks this *before* pulling, so no source token
//!   past a hardstop is ever consumed. This is also why the driver pulls
//!   lazily instead of prefetching through a buffer task.
//! - **Holdback**: a delimiter may straddle a fragment boundary. A buffer
//!   tail that is a proper prefix of some delimiter is held back and never
//!   surfaced until the match is decided.

use futures::Stream;
use sigil_core::events::Event;
use sigil_core::protocol::{DelimiterMatch, EventKind, SIGIL, match_delimiter};
use sigil_llm::ProviderError;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::errors::EngineError;

/// Separator state after a delimiter match: an optional run of spaces, one
/// optional `:`, then spaces, none of which belong to the event content.
#[derive(Debug, Default)]
struct SeparatorState {
    colon_seen: bool,
}

/// Incremental protocol parser.
#[derive(Debug)]
pub struct StreamParser {
    kind: EventKind,
    /// Held-back buffer tail that may still become a delimiter.
    tail: String,
    /// Pending separator consumption after a delimiter match.
    sep: Option<SeparatorState>,
    stopped: bool,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamParser {
    /// Create a parser in its initial state (`think`, not stopped).
    #[must_use]
    pub fn new() -> Self {
        Self {
            kind: EventKind::Think,
            tail: String::new(),
            sep: None,
            stopped: false,
        }
    }

    /// Whether a hardstop boundary has been emitted. Once true, `push` is a
    /// no-op and the caller must stop feeding fragments.
    #[must_use]
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// The kind the next text content will be attributed to.
    #[must_use]
    pub fn current_kind(&self) -> EventKind {
        self.kind
    }

    /// Consume one fragment, returning the events it completes.
    pub fn push(&mut self, fragment: &str) -> Vec<Event> {
        if self.stopped {
            return Vec::new();
        }

        let mut text = std::mem::take(&mut self.tail);
        text.push_str(fragment);

        let mut out = Vec::new();
        let mut seg = String::new();
        let mut rest = text.as_str();

        while !rest.is_empty() {
            if let Some(sep) = &mut self.sep {
                match skip_separator(rest, sep) {
                    Some(idx) => {
                        self.sep = None;
                        rest = &rest[idx..];
                        continue;
                    }
                    None => break, // fragment ended inside the separator
                }
            }

            let Some(pos) = rest.find(SIGIL) else {
                seg.push_str(rest);
                break;
            };

            seg.push_str(&rest[..pos]);
            let candidate = &rest[pos..];
            match match_delimiter(candidate) {
                DelimiterMatch::Partial => {
                    // Could still complete with the next fragment.
                    self.tail = candidate.to_owned();
                    break;
                }
                DelimiterMatch::NoMatch => {
                    // Literal sigil in content.
                    seg.push(SIGIL);
                    rest = &candidate[SIGIL.len_utf8()..];
                }
                DelimiterMatch::Match { kind, len } => {
                    if !seg.is_empty() {
                        out.push(Event::text(self.kind, std::mem::take(&mut seg)));
                    }
                    if kind.is_hardstop() {
                        out.push(Event::boundary(kind));
                        self.stopped = true;
                        self.tail.clear();
                        return out;
                    }
                    self.kind = kind;
                    self.sep = Some(SeparatorState::default());
                    rest = &candidate[len..];
                }
            }
        }

        if !seg.is_empty() {
            out.push(Event::text(self.kind, seg));
        }
        out
    }

    /// Signal end of input. A held-back partial delimiter is literal
    /// content at this point and flushes as a final text event.
    pub fn finish(&mut self) -> Option<Event> {
        if self.stopped {
            return None;
        }
        let tail = std::mem::take(&mut self.tail);
        if tail.is_empty() {
            None
        } else {
            Some(Event::text(self.kind, tail))
        }
    }
}

/// Find the first byte index in `rest` past the separator, advancing
/// `state` over spaces and at most one colon. `None` when the whole input
/// is separator.
fn skip_separator(rest: &str, state: &mut SeparatorState) -> Option<usize> {
    for (i, ch) in rest.char_indices() {
        match ch {
            ' ' => {}
            ':' if !state.colon_seen => state.colon_seen = true,
            _ => return Some(i),
        }
    }
    None
}

/// Drive a [`StreamParser`] over a fragment stream.
///
/// Pulls one fragment at a time — never ahead of the parser — and stops
/// pulling entirely once a hardstop is emitted or `cancel` fires. The
/// upstream source may still hold unproduced fragments at that point; they
/// are never pulled, parsed, or surfaced.
pub fn parse_fragments<S>(
    source: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Event, EngineError>> + Send
where
    S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
{
    async_stream::stream! {
        let mut source = Box::pin(source);
        let mut parser = StreamParser::new();

        while !parser.stopped() {
            // biased: prefer cancellation when both are ready
            let fragment = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                fragment = source.next() => fragment,
            };

            match fragment {
                None => {
                    if let Some(ev) = parser.finish() {
                        yield Ok(ev);
                    }
                    break;
                }
                Some(Err(e)) => {
                    yield Err(EngineError::Provider(e));
                    break;
                }
                Some(Ok(text)) => {
                    for ev in parser.push(&text) {
                        yield Ok(ev);
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
