//! Edit operations: the unit of change exchanged between participants.
//!
//! An [`EditOperation`] describes a single-range replacement within one
//! line of the document. Operations are immutable once created and carry
//! everything the merge engine needs: position, replaced text, author,
//! and the last-writer-wins timestamp.
//!
//! Text payloads are length-bounded at construction. The wire format
//! (see [`crate::wire`]) reserves 255 bytes for text snippets and 31
//! bytes for identifiers, so oversized input is cut down to fit, always
//! on a UTF-8 character boundary. Truncation is reported through an
//! explicit flag rather than silently dropped.

use chrono::{DateTime, Utc};

/// Maximum byte length of an operation's text snippet.
pub const MAX_TEXT_BYTES: usize = 255;

/// Maximum byte length of a participant identifier.
pub const MAX_ID_BYTES: usize = 31;

/// Cut `s` down to at most `max_bytes` bytes, landing on a character
/// boundary. Returns the owned prefix and whether anything was lost.
fn truncate_to_boundary(s: &str, max_bytes: usize) -> (String, bool) {
    if s.len() <= max_bytes {
        return (s.to_string(), false);
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (s[..end].to_string(), true)
}

/// A text snippet bounded to [`MAX_TEXT_BYTES`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BoundedText {
    text: String,
    truncated: bool,
}

impl BoundedText {
    /// Build a snippet, truncating deterministically when the input
    /// exceeds the cap.
    pub fn new(text: impl AsRef<str>) -> Self {
        let (text, truncated) = truncate_to_boundary(text.as_ref(), MAX_TEXT_BYTES);
        Self { text, truncated }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the original input was cut to fit the byte cap.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of characters (not bytes) in the snippet.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

impl std::fmt::Display for BoundedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// A participant identifier bounded to [`MAX_ID_BYTES`].
///
/// Ordering is byte-wise lexicographic; the merge engine relies on this
/// for its deterministic timestamp tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId {
    id: String,
    truncated: bool,
}

impl ParticipantId {
    pub fn new(id: impl AsRef<str>) -> Self {
        let (id, truncated) = truncate_to_boundary(id.as_ref(), MAX_ID_BYTES);
        Self { id, truncated }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Operation kind tag. Only `Replace` exists today; the wire tag leaves
/// room for future kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpKind {
    /// Replace a column range within one line.
    Replace = 1,
}

impl OpKind {
    pub fn as_tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(OpKind::Replace),
            _ => None,
        }
    }
}

/// Half-open column interval `[start, end)` within a line.
///
/// Columns are measured in characters, not bytes, so an interval can
/// never split a UTF-8 sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColRange {
    pub start: u32,
    pub end: u32,
}

impl ColRange {
    /// Build a range, normalizing `end` up to `start` so the half-open
    /// invariant `start <= end` always holds.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Whether two ranges share at least one column.
    pub fn overlaps(&self, other: &ColRange) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A single-range line replacement, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOperation {
    pub kind: OpKind,
    /// Zero-based line index the edit applies to.
    pub line: u32,
    /// Character interval within the line being replaced.
    pub range: ColRange,
    /// Content previously occupying `range`.
    pub old_text: BoundedText,
    /// Content to put in its place.
    pub new_text: BoundedText,
    /// Identifier of the authoring process.
    pub origin: ParticipantId,
    /// Seconds since epoch at authoring time; the LWW comparator.
    pub logical_time: i64,
    /// Human-readable rendering of `logical_time`. Derived, never
    /// consulted for conflict resolution.
    pub display_time: String,
}

impl EditOperation {
    /// Build a replacement operation, stamping the display time from the
    /// logical timestamp.
    pub fn replace(
        line: u32,
        range: ColRange,
        old_text: impl AsRef<str>,
        new_text: impl AsRef<str>,
        origin: ParticipantId,
        logical_time: i64,
    ) -> Self {
        Self {
            kind: OpKind::Replace,
            line,
            range,
            old_text: BoundedText::new(old_text),
            new_text: BoundedText::new(new_text),
            origin,
            logical_time,
            display_time: format_display_time(logical_time),
        }
    }

    /// Whether any field lost content to the byte caps.
    pub fn truncation_occurred(&self) -> bool {
        self.old_text.truncated() || self.new_text.truncated() || self.origin.truncated()
    }

    /// Whether this operation conflicts with `other`: same line and
    /// overlapping column ranges.
    pub fn conflicts_with(&self, other: &EditOperation) -> bool {
        self.line == other.line && self.range.overlaps(&other.range)
    }
}

/// Render an epoch-seconds timestamp for notifications and display.
pub fn format_display_time(logical_time: i64) -> String {
    match DateTime::<Utc>::from_timestamp(logical_time, 0) {
        Some(dt) => dt.format("%a %b %e %H:%M:%S %Y").to_string(),
        None => String::from("(invalid time)"),
    }
}

/// Current wall-clock time as epoch seconds.
pub fn now_epoch_seconds() -> i64 {
    Utc::now().timestamp()
}
