//! Line-oriented diff engine.
//!
//! Reduces a whole-document change into the minimal per-line replacement
//! operations under a longest-common-prefix / longest-common-suffix
//! trimming rule. One operation per changed line: a line with two
//! independently edited regions collapses into a single operation
//! spanning both. That is a deliberate simplification of the engine, not
//! an accident; multi-hunk diffing within a line is out of scope.

use crate::op::{now_epoch_seconds, ColRange, EditOperation, ParticipantId};

/// The trimmed middle of a changed line, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LineDelta {
    prefix: usize,
    old_end: usize,
    new_end: usize,
    old_part: String,
    new_part: String,
}

/// Trim the common prefix and suffix off a changed line pair.
///
/// Returns `None` when the differing middles come out equal, which
/// happens when the naive prefix/suffix windows coincide (for example
/// `"aa"` vs `"aaa"` viewed from both ends).
fn line_delta(old_line: &str, new_line: &str) -> Option<LineDelta> {
    let old: Vec<char> = old_line.chars().collect();
    let new: Vec<char> = new_line.chars().collect();

    let min_len = old.len().min(new.len());
    let mut prefix = 0;
    while prefix < min_len && old[prefix] == new[prefix] {
        prefix += 1;
    }

    let mut old_end = old.len();
    let mut new_end = new.len();
    while old_end > prefix && new_end > prefix && old[old_end - 1] == new[new_end - 1] {
        old_end -= 1;
        new_end -= 1;
    }

    let old_part: String = old[prefix..old_end].iter().collect();
    let new_part: String = new[prefix..new_end].iter().collect();
    if old_part == new_part {
        return None;
    }

    Some(LineDelta {
        prefix,
        old_end,
        new_end,
        old_part,
        new_part,
    })
}

/// Diff two document states, emitting one replacement operation per
/// changed line, stamped with the current wall-clock time.
pub fn diff_lines(
    old_lines: &[String],
    new_lines: &[String],
    author: &ParticipantId,
) -> Vec<EditOperation> {
    diff_lines_at(old_lines, new_lines, author, now_epoch_seconds())
}

/// [`diff_lines`] with an injected timestamp. Every emitted operation
/// carries the same `logical_time`; tests and benchmarks use this to
/// stay deterministic.
pub fn diff_lines_at(
    old_lines: &[String],
    new_lines: &[String],
    author: &ParticipantId,
    logical_time: i64,
) -> Vec<EditOperation> {
    let max_len = old_lines.len().max(new_lines.len());
    let mut ops = Vec::new();

    for i in 0..max_len {
        // A line missing on either side is treated as empty.
        let old_line = old_lines.get(i).map(String::as_str).unwrap_or("");
        let new_line = new_lines.get(i).map(String::as_str).unwrap_or("");
        if old_line == new_line {
            continue;
        }

        let Some(delta) = line_delta(old_line, new_line) else {
            continue;
        };

        let range = ColRange::new(
            delta.prefix as u32,
            delta.old_end.max(delta.new_end) as u32,
        );
        ops.push(EditOperation::replace(
            i as u32,
            range,
            &delta.old_part,
            &delta.new_part,
            author.clone(),
            logical_time,
        ));
    }

    ops
}
