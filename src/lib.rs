extern crate self as markwright;

use std::collections::BTreeMap;

#[macro_use]
mod macros;
mod api;
pub mod engine;
pub mod filters;
pub mod plugins;
pub mod schema;
pub mod serializer;

pub use api::{Parsed, default_schema, parse, parse_with};
pub use engine::{Engine, EngineError, LogEntry, ParseLog, Severity};
pub use schema::Schema;

// --- Core event types --------------------------------------------------------

bitflags::bitflags! {
    /// Kind of a tag occurrence.
    ///
    /// `SELF_CLOSING` is the bitwise union of `START` and `END`, so
    /// `kind.contains(TagKind::START)` and `kind.contains(TagKind::END)` are
    /// the meaningful predicates rather than exact equality.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TagKind: u8 {
        const START = 1 << 0;
        const END   = 1 << 1;
        const SELF_CLOSING = Self::START.bits() | Self::END.bits();
    }
}

impl TagKind {
    /// Sort rank used by the candidate comparator: START < END < SELF_CLOSING.
    pub(crate) fn rank(self) -> u8 {
        self.bits()
    }
}

/// One opening, closing, or self-closing occurrence of a named tag at a byte
/// position in the input.
///
/// Candidate events come out of plugin recognizers; processed events come out
/// of resolution with `trim_before`/`trim_after` filled in and positions
/// possibly widened to absorb surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEvent {
    /// Start byte offset of the occurrence's textual form.
    pub pos: usize,
    /// Byte length of the occurrence's textual form.
    pub len: usize,
    /// Canonical (uppercased) tag name.
    pub name: String,
    pub kind: TagKind,
    /// Attribute values keyed by name. The map order is the lexicographic
    /// order the serializer emits.
    pub attrs: BTreeMap<String, String>,
    /// Pairing identifier: an END only closes a START with the same
    /// `(name, suffix)`. Recognizers may leave this empty; dispatch then
    /// assigns `"-<pluginName>"` so events from different plugins cannot
    /// close each other.
    pub suffix: String,
    /// Name of the plugin that emitted the event (sort tiebreaker).
    pub plugin_name: String,
    /// Number of whitespace bytes at the front of the span that belong to
    /// trimming, not to the tag's own text. Computed during resolution.
    pub trim_before: usize,
    /// Number of whitespace bytes at the back of the span that belong to
    /// trimming. Computed during resolution.
    pub trim_after: usize,
}

impl TagEvent {
    pub fn new(kind: TagKind, name: impl Into<String>, pos: usize, len: usize) -> Self {
        TagEvent {
            pos,
            len,
            name: name.into(),
            kind,
            attrs: BTreeMap::new(),
            suffix: String::new(),
            plugin_name: String::new(),
            trim_before: 0,
            trim_after: 0,
        }
    }

    pub fn start(name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self::new(TagKind::START, name, pos, len)
    }

    pub fn end(name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self::new(TagKind::END, name, pos, len)
    }

    pub fn self_closing(name: impl Into<String>, pos: usize, len: usize) -> Self {
        Self::new(TagKind::SELF_CLOSING, name, pos, len)
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// True for START and SELF_CLOSING events.
    pub fn is_start_tag(&self) -> bool {
        self.kind.contains(TagKind::START)
    }

    /// True for END and SELF_CLOSING events.
    pub fn is_end_tag(&self) -> bool {
        self.kind.contains(TagKind::END)
    }

    /// Byte offset one past the end of the span.
    pub fn end_pos(&self) -> usize {
        self.pos + self.len
    }

    /// Pairing key for the open-tag stack.
    pub(crate) fn pair_key(&self) -> (String, String) {
        (self.name.clone(), self.suffix.clone())
    }
}

// --- Match structures handed to recognizers ----------------------------------

/// One capture group of a regular-expression match: the matched text and its
/// start byte offset in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
    pub text: String,
    pub start: usize,
}

impl MatchGroup {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// One full match of a plugin pattern.
///
/// Group 0 (the whole match) is always present; numbered groups that did not
/// participate in the match are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// The whole match (capture group 0).
    pub whole: MatchGroup,
    /// Capture groups 1 and up.
    pub groups: Vec<Option<MatchGroup>>,
}

// --- Shared byte helpers ------------------------------------------------------

/// The fixed whitespace set absorbed by trim directives.
pub(crate) fn is_trimmable_ws(byte: u8) -> bool {
    matches!(byte, b' ' | b'\n' | b'\r' | b'\t' | b'\0' | 0x0B)
}
