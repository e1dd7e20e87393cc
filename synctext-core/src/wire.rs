//! Fixed-size binary wire record for edit operations.
//!
//! One record per transport message, little-endian, 597 bytes:
//!
//! ```text
//! ┌──────┬──────┬───────┬──────┬──────────┬────────┬──────────────┬──────────┬──────────┐
//! │ kind │ line │ start │ end  │ logical  │ origin │ display_time │ old_text │ new_text │
//! │ u8   │ i32  │ i32   │ i32  │ time i64 │ 32 B   │ 32 B         │ 256 B    │ 256 B    │
//! └──────┴──────┴───────┴──────┴──────────┴────────┴──────────────┴──────────┴──────────┘
//! ```
//!
//! Text fields are NUL-padded with one terminator byte reserved, so
//! identifiers carry at most 31 bytes and text snippets at most 255,
//! matching the caps in [`crate::op`]. Decoding is forgiving: a buffer
//! of the wrong length or with an unknown kind tag is "no message yet"
//! (`None`), never an error, and out-of-range numeric fields are
//! clamped rather than rejected. Invalid UTF-8 is replaced lossily.

use crate::op::{ColRange, EditOperation, OpKind, ParticipantId};

const KIND_OFF: usize = 0;
const LINE_OFF: usize = 1;
const START_OFF: usize = 5;
const END_OFF: usize = 9;
const TIME_OFF: usize = 13;
const ORIGIN_OFF: usize = 21;
const DISPLAY_OFF: usize = 53;
const OLD_OFF: usize = 85;
const NEW_OFF: usize = 341;

const ID_FIELD: usize = 32;
const TEXT_FIELD: usize = 256;

/// Exact size of every wire record.
pub const RECORD_LEN: usize = NEW_OFF + TEXT_FIELD;

/// NUL-pad `s` into `field`, keeping the final byte as terminator. The
/// bounded types in [`crate::op`] already fit; anything longer is cut
/// at a character boundary as a last resort.
fn put_str(field: &mut [u8], s: &str) {
    let cap = field.len() - 1;
    let mut end = s.len().min(cap);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    field[..end].copy_from_slice(&s.as_bytes()[..end]);
    for b in &mut field[end..] {
        *b = 0;
    }
}

/// Read a NUL-terminated field, replacing invalid UTF-8.
fn get_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Serialize an operation into a fixed-size record.
pub fn encode(op: &EditOperation) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    buf[KIND_OFF] = op.kind.as_tag();
    buf[LINE_OFF..LINE_OFF + 4].copy_from_slice(&(op.line as i32).to_le_bytes());
    buf[START_OFF..START_OFF + 4].copy_from_slice(&(op.range.start as i32).to_le_bytes());
    buf[END_OFF..END_OFF + 4].copy_from_slice(&(op.range.end as i32).to_le_bytes());
    buf[TIME_OFF..TIME_OFF + 8].copy_from_slice(&op.logical_time.to_le_bytes());
    put_str(&mut buf[ORIGIN_OFF..ORIGIN_OFF + ID_FIELD], op.origin.as_str());
    put_str(&mut buf[DISPLAY_OFF..DISPLAY_OFF + ID_FIELD], &op.display_time);
    put_str(&mut buf[OLD_OFF..OLD_OFF + TEXT_FIELD], op.old_text.as_str());
    put_str(&mut buf[NEW_OFF..NEW_OFF + TEXT_FIELD], op.new_text.as_str());
    buf
}

/// Deserialize a record. Returns `None` for short or oversized buffers
/// and unknown kind tags; both mean "no message yet" to the receiver.
pub fn decode(buf: &[u8]) -> Option<EditOperation> {
    if buf.len() != RECORD_LEN {
        return None;
    }
    let kind = OpKind::from_tag(buf[KIND_OFF])?;

    let line = i32::from_le_bytes(buf[LINE_OFF..LINE_OFF + 4].try_into().ok()?);
    let start = i32::from_le_bytes(buf[START_OFF..START_OFF + 4].try_into().ok()?);
    let end = i32::from_le_bytes(buf[END_OFF..END_OFF + 4].try_into().ok()?);
    let logical_time = i64::from_le_bytes(buf[TIME_OFF..TIME_OFF + 8].try_into().ok()?);

    // Negative positions are locally corrected, not rejected.
    let line = line.max(0) as u32;
    let start = start.max(0) as u32;
    let end = end.max(0) as u32;

    let origin = ParticipantId::new(get_str(&buf[ORIGIN_OFF..ORIGIN_OFF + ID_FIELD]));
    let display_time = get_str(&buf[DISPLAY_OFF..DISPLAY_OFF + ID_FIELD]);
    let old_text = get_str(&buf[OLD_OFF..OLD_OFF + TEXT_FIELD]);
    let new_text = get_str(&buf[NEW_OFF..NEW_OFF + TEXT_FIELD]);

    let mut op = EditOperation::replace(
        line,
        ColRange::new(start, end),
        old_text,
        new_text,
        origin,
        logical_time,
    );
    op.kind = kind;
    // The sender's rendering is authoritative for display only.
    if !display_time.is_empty() {
        op.display_time = display_time;
    }
    Some(op)
}
