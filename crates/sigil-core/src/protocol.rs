//! Protocol vocabulary: the `§`-delimiter set and event-kind enumeration.
//!
//! The model speaks a delimiter-based text protocol. Each `§DELIMITER`
//! switches the stream into a new event kind; text between delimiters is
//! that kind's content. Two boundaries are **hardstops**: once `§END` or
//! `§EXECUTE` is seen, no further source tokens may be consumed.
//!
//! Canonical delimiter forms are uppercase; matching is
//! ASCII-case-insensitive because upstream models emit both (`§END` and
//! `§end` are the same boundary).

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Delimiters
// ─────────────────────────────────────────────────────────────────────────────

/// The section sign that introduces every protocol delimiter.
pub const SIGIL: char = '§';

/// Thinking segment delimiter.
pub const DELIM_THINK: &str = "§THINK";
/// Multi-call segment delimiter.
pub const DELIM_CALLS: &str = "§CALLS";
/// Single-call variant delimiter.
pub const DELIM_CALL: &str = "§CALL";
/// User-visible response segment delimiter.
pub const DELIM_RESPOND: &str = "§RESPOND";
/// Yield-to-caller segment delimiter.
pub const DELIM_YIELD: &str = "§YIELD";
/// Terminal boundary: the task is complete. Hardstop.
pub const DELIM_END: &str = "§END";
/// Tool-execution boundary, emitted between a call and its result. Hardstop.
pub const DELIM_EXECUTE: &str = "§EXECUTE";

/// Delimiter keywords (without the sigil), longest-first so that `CALLS`
/// wins over `CALL` and prefix overlaps resolve deterministically.
const KEYWORDS: &[(&str, EventKind)] = &[
    ("EXECUTE", EventKind::Execute),
    ("RESPOND", EventKind::Respond),
    ("CALLS", EventKind::Calls),
    ("THINK", EventKind::Think),
    ("YIELD", EventKind::Yield),
    ("CALL", EventKind::Call),
    ("END", EventKind::End),
];

// ─────────────────────────────────────────────────────────────────────────────
// Event kinds
// ─────────────────────────────────────────────────────────────────────────────

/// The semantic kind of a protocol event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Model reasoning, not shown to the user.
    Think,
    /// A single tool call.
    Call,
    /// A batch of tool calls.
    Calls,
    /// Boundary between a call and its result. Hardstop.
    Execute,
    /// A tool result fed back to the model.
    Result,
    /// User-visible response text.
    Respond,
    /// Control yielded back to the caller.
    Yield,
    /// Terminal boundary: the task is complete. Hardstop.
    End,
}

impl EventKind {
    /// Whether this kind is a hardstop boundary: after it is emitted, no
    /// further source tokens may be consumed.
    #[must_use]
    pub fn is_hardstop(self) -> bool {
        matches!(self, Self::Execute | Self::End)
    }

    /// Whether this kind carries tool calls.
    #[must_use]
    pub fn is_call(self) -> bool {
        matches!(self, Self::Call | Self::Calls)
    }

    /// Whether consecutive events of this kind may be coalesced into one.
    ///
    /// Call, execute, result, and end events are boundaries of their own;
    /// only free-text kinds coalesce.
    #[must_use]
    pub fn is_coalescible(self) -> bool {
        matches!(self, Self::Think | Self::Respond | Self::Yield)
    }

    /// Canonical lowercase name, matching the wire/event-log form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Think => "think",
            Self::Call => "call",
            Self::Calls => "calls",
            Self::Execute => "execute",
            Self::Result => "result",
            Self::Respond => "respond",
            Self::Yield => "yield",
            Self::End => "end",
        }
    }

    /// Canonical delimiter for this kind, if it has one on the wire.
    ///
    /// `Result` is engine-produced and has no delimiter.
    #[must_use]
    pub fn delimiter(self) -> Option<&'static str> {
        match self {
            Self::Think => Some(DELIM_THINK),
            Self::Call => Some(DELIM_CALL),
            Self::Calls => Some(DELIM_CALLS),
            Self::Execute => Some(DELIM_EXECUTE),
            Self::Respond => Some(DELIM_RESPOND),
            Self::Yield => Some(DELIM_YIELD),
            Self::End => Some(DELIM_END),
            Self::Result => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delimiter matching
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of matching text that starts with [`SIGIL`] against the
/// delimiter vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelimiterMatch {
    /// A full delimiter matched; `len` is the matched byte length
    /// (sigil + keyword).
    Match {
        /// The event kind the delimiter switches to.
        kind: EventKind,
        /// Matched byte length, including the sigil.
        len: usize,
    },
    /// The text is a proper prefix of at least one delimiter; more input is
    /// needed before the match can be decided.
    Partial,
    /// The text is not a delimiter; the sigil is literal content.
    NoMatch,
}

/// Match the delimiter vocabulary at the start of `text`.
///
/// `text` must begin with [`SIGIL`]. Matching is ASCII-case-insensitive.
/// A match that ends exactly at the end of `text` while still being a
/// proper prefix of a longer keyword (`§CALL` vs `§CALLS`) reports
/// [`DelimiterMatch::Partial`] so a fragment boundary can never split a
/// delimiter into a shorter false match.
#[must_use]
pub fn match_delimiter(text: &str) -> DelimiterMatch {
    debug_assert!(text.starts_with(SIGIL));
    let rest = &text[SIGIL.len_utf8()..];

    if rest.is_empty() {
        return DelimiterMatch::Partial;
    }

    // Byte-wise comparison: `rest` may contain multi-byte characters, so
    // str slicing at keyword length is not boundary-safe.
    let rest_bytes = rest.as_bytes();
    let mut saw_partial = false;
    for &(keyword, kind) in KEYWORDS {
        let kw_bytes = keyword.as_bytes();
        if rest_bytes.len() < kw_bytes.len() {
            if kw_bytes[..rest_bytes.len()].eq_ignore_ascii_case(rest_bytes) {
                saw_partial = true;
            }
            continue;
        }
        if rest_bytes[..kw_bytes.len()].eq_ignore_ascii_case(kw_bytes) {
            // `§CALL` at end-of-input could still become `§CALLS`.
            if rest_bytes.len() == kw_bytes.len() && extends_to_longer_keyword(keyword) {
                return DelimiterMatch::Partial;
            }
            return DelimiterMatch::Match {
                kind,
                len: SIGIL.len_utf8() + keyword.len(),
            };
        }
    }

    if saw_partial {
        DelimiterMatch::Partial
    } else {
        DelimiterMatch::NoMatch
    }
}

/// Whether `keyword` is a proper prefix of a longer keyword in the
/// vocabulary.
fn extends_to_longer_keyword(keyword: &str) -> bool {
    KEYWORDS.iter().any(|(other, _)| {
        other.len() > keyword.len() && other[..keyword.len()].eq_ignore_ascii_case(keyword)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
