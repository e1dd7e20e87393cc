//! Merge engine: last-writer-wins conflict resolution and ordered replay.
//!
//! A merge takes the combined batch of local and remote operations and
//! produces the next document state in three steps:
//!
//! ```text
//! batch ──► canonical sort ──► pairwise elimination ──► replay
//!           (precedence desc)   (overlapping ranges)    (per line,
//!                                                        rightmost
//!                                                        edit first)
//! ```
//!
//! Two operations conflict iff they target the same line and their
//! column ranges overlap. Among conflicting operations exactly one
//! survives: higher `logical_time` wins, ties fall to the byte-wise
//! smaller `origin`, and any remaining ties are settled by range and
//! replacement text so that precedence is a total order. Sorting the
//! batch into that order before elimination makes the surviving set,
//! and therefore the merged document, identical for every permutation
//! of the input batch.
//!
//! Replay applies each line's survivors in descending start-column
//! order. Column positions are relative to the original line content;
//! applying the rightmost edit first keeps the leftward offsets valid.
//! Out-of-range columns are clamped to the current line length, never
//! indexed out of bounds.
//!
//! Everything here is pure: no I/O, no clocks, no logging. Persisting
//! and displaying the result is the caller's job.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::op::EditOperation;

/// Total precedence order used for conflict resolution.
///
/// `Greater` means `a` beats `b`. Primary key: higher `logical_time`.
/// Tie-break: lower `origin` (byte-wise). Further ties cannot occur for
/// distinct participants, but range and replacement text keep the order
/// total so resolution stays deterministic even for pathological input.
pub fn cmp_precedence(a: &EditOperation, b: &EditOperation) -> Ordering {
    a.logical_time
        .cmp(&b.logical_time)
        .then_with(|| b.origin.cmp(&a.origin))
        .then_with(|| b.line.cmp(&a.line))
        .then_with(|| b.range.start.cmp(&a.range.start))
        .then_with(|| b.range.end.cmp(&a.range.end))
        .then_with(|| b.new_text.cmp(&a.new_text))
}

/// Resolve conflicts within a batch, returning the surviving operations
/// in canonical precedence order (strongest first).
///
/// Elimination is pairwise over all pairs: a discarded loser is skipped
/// in later comparisons, while a survivor keeps eliminating every
/// weaker operation whose range overlaps its own. Because the batch is
/// sorted by precedence first, the outcome does not depend on the order
/// operations arrived in.
pub fn resolve(batch: &[EditOperation]) -> Vec<EditOperation> {
    let mut ops: Vec<EditOperation> = batch.to_vec();
    ops.sort_by(|a, b| cmp_precedence(b, a));

    let n = ops.len();
    let mut keep = vec![true; n];
    for i in 0..n {
        if !keep[i] {
            continue;
        }
        for j in (i + 1)..n {
            if !keep[j] {
                continue;
            }
            if ops[i].conflicts_with(&ops[j]) {
                keep[j] = false;
            }
        }
    }

    ops.into_iter()
        .zip(keep)
        .filter_map(|(op, kept)| kept.then_some(op))
        .collect()
}

/// Replay surviving operations onto a document, returning the new line
/// sequence. The input lines are never mutated.
pub fn replay(lines: &[String], survivors: &[EditOperation]) -> Vec<String> {
    let mut doc: Vec<String> = lines.to_vec();
    if survivors.is_empty() {
        return doc;
    }

    // Extend with empty lines up to the highest referenced index.
    let max_line = survivors.iter().map(|op| op.line as usize).max().unwrap_or(0);
    while doc.len() <= max_line {
        doc.push(String::new());
    }

    let mut by_line: BTreeMap<u32, Vec<&EditOperation>> = BTreeMap::new();
    for op in survivors {
        by_line.entry(op.line).or_default().push(op);
    }

    for (line_no, mut ops) in by_line {
        // Rightmost edit first so leftward column offsets stay valid
        // against the original line content.
        ops.sort_by(|a, b| b.range.start.cmp(&a.range.start));

        let mut chars: Vec<char> = doc[line_no as usize].chars().collect();
        for op in ops {
            let len = chars.len();
            let start = (op.range.start as usize).min(len);
            let end = (op.range.end as usize).min(len).max(start);
            chars.splice(start..end, op.new_text.as_str().chars());
        }
        doc[line_no as usize] = chars.into_iter().collect();
    }

    doc
}

/// Resolve and replay in one step. `merge(&[], doc)` returns the
/// document unchanged.
pub fn merge(batch: &[EditOperation], lines: &[String]) -> Vec<String> {
    if batch.is_empty() {
        return lines.to_vec();
    }
    replay(lines, &resolve(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{ColRange, ParticipantId};

    fn op(
        line: u32,
        start: u32,
        end: u32,
        new_text: &str,
        origin: &str,
        ts: i64,
    ) -> EditOperation {
        EditOperation::replace(
            line,
            ColRange::new(start, end),
            "",
            new_text,
            ParticipantId::new(origin),
            ts,
        )
    }

    fn doc(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_batch_is_identity() {
        let d = doc(&["keep me", "exactly"]);
        assert_eq!(merge(&[], &d), d);
    }

    #[test]
    fn test_later_timestamp_wins() {
        let d = doc(&["aaaaa rest"]);
        let older = op(0, 0, 5, "OLDER", "alice", 100);
        let newer = op(0, 0, 5, "NEWER", "bob", 200);

        let merged = merge(&[older, newer], &d);
        assert_eq!(merged, doc(&["NEWER rest"]));
    }

    #[test]
    fn test_timestamp_tie_smaller_origin_wins() {
        let d = doc(&["aaaaa rest"]);
        let a = op(0, 0, 5, "HELLO", "alice", 100);
        let b = op(0, 0, 5, "HOWDY", "bob", 100);

        let merged = merge(&[a, b], &d);
        assert_eq!(merged, doc(&["HELLO rest"]));
    }

    #[test]
    fn test_disjoint_ranges_both_apply() {
        let d = doc(&["0123456789"]);
        let left = op(0, 0, 2, "AB", "alice", 100);
        let right = op(0, 8, 10, "YZ", "bob", 100);

        let forward = merge(&[left.clone(), right.clone()], &d);
        let backward = merge(&[right, left], &d);
        assert_eq!(forward, doc(&["AB234567YZ"]));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_different_lines_never_conflict() {
        let d = doc(&["first", "second"]);
        let a = op(0, 0, 5, "FIRST", "alice", 100);
        let b = op(1, 0, 6, "SECOND", "bob", 100);

        assert_eq!(merge(&[a, b], &d), doc(&["FIRST", "SECOND"]));
    }

    #[test]
    fn test_document_extends_to_referenced_line() {
        let d = doc(&["only line"]);
        let far = op(3, 0, 0, "way down", "alice", 100);

        let merged = merge(&[far], &d);
        assert_eq!(merged, doc(&["only line", "", "", "way down"]));
    }

    #[test]
    fn test_out_of_range_columns_clamp() {
        let d = doc(&["short"]);
        let past_end = op(0, 50, 90, "!", "alice", 100);

        let merged = merge(&[past_end], &d);
        assert_eq!(merged, doc(&["short!"]));
    }

    #[test]
    fn test_replay_clamps_against_evolving_line() {
        // Two survivors on one line: the right edit shrinks the line,
        // the left edit's columns still resolve against valid indices.
        let d = doc(&["abcdefgh"]);
        let left = op(0, 0, 2, "X", "alice", 100);
        let right = op(0, 4, 8, "", "bob", 100);

        let merged = merge(&[left, right], &d);
        assert_eq!(merged, doc(&["Xcd"]));
    }

    #[test]
    fn test_merge_determinism_under_permutation() {
        let d = doc(&["the quick brown fox jumps"]);
        let ops = [
            op(0, 0, 3, "THE", "carol", 300),
            op(0, 4, 9, "slow!", "alice", 200),
            op(0, 4, 9, "rapid", "bob", 250),
            op(0, 16, 19, "cat", "dave", 100),
        ];

        // All 24 permutations of the batch produce the same document.
        let reference = merge(&ops, &d);
        let idx = [0, 1, 2, 3];
        let mut perms = Vec::new();
        permutations(&idx, &mut vec![], &mut perms);
        for perm in perms {
            let batch: Vec<EditOperation> = perm.iter().map(|&i| ops[i].clone()).collect();
            assert_eq!(merge(&batch, &d), reference, "permutation {perm:?}");
        }
        assert_eq!(reference, doc(&["THE rapid brown cat jumps"]));
    }

    #[test]
    fn test_three_mutually_overlapping_global_max_survives() {
        // Open-question property: with three mutually overlapping
        // operations at distinct timestamps, only the global maximum
        // survives, for every evaluation order.
        let ops = [
            op(0, 0, 10, "oldest", "alice", 100),
            op(0, 2, 8, "middle", "bob", 200),
            op(0, 5, 12, "newest", "carol", 300),
        ];

        let idx = [0, 1, 2];
        let mut perms = Vec::new();
        permutations(&idx, &mut vec![], &mut perms);
        for perm in perms {
            let batch: Vec<EditOperation> = perm.iter().map(|&i| ops[i].clone()).collect();
            let survivors = resolve(&batch);
            assert_eq!(survivors.len(), 1, "permutation {perm:?}");
            assert_eq!(survivors[0].new_text.as_str(), "newest");
        }
    }

    #[test]
    fn test_overlap_chain_is_order_independent() {
        // A-B overlap, B-C overlap, A-C disjoint. The strongest (A)
        // eliminates B; C survives because the discarded B no longer
        // participates. Canonical ordering makes this stable across
        // arrival orders.
        let a = op(0, 0, 5, "AAAA", "alice", 300);
        let b = op(0, 4, 9, "BBBB", "bob", 200);
        let c = op(0, 8, 12, "CCCC", "carol", 100);

        let idx = [0, 1, 2];
        let ops = [a, b, c];
        let mut perms = Vec::new();
        permutations(&idx, &mut vec![], &mut perms);
        for perm in perms {
            let batch: Vec<EditOperation> = perm.iter().map(|&i| ops[i].clone()).collect();
            let survivors = resolve(&batch);
            let texts: Vec<&str> = survivors.iter().map(|o| o.new_text.as_str()).collect();
            assert_eq!(texts, vec!["AAAA", "CCCC"], "permutation {perm:?}");
        }
    }

    #[test]
    fn test_survivors_come_out_in_precedence_order() {
        let newer = op(0, 0, 2, "b", "bob", 300);
        let older = op(1, 0, 2, "a", "alice", 100);
        let survivors = resolve(&[older.clone(), newer.clone()]);
        assert_eq!(survivors, vec![newer, older]);
    }

    #[test]
    fn test_multibyte_replay() {
        let d = doc(&["héllo wörld"]);
        let merged = merge(&[op(0, 9, 11, "ms", "alice", 100)], &d);
        assert_eq!(merged, doc(&["héllo wörms"]));
    }

    #[test]
    fn test_resolve_keeps_non_conflicting_batch_intact() {
        let ops = [
            op(0, 0, 1, "a", "alice", 100),
            op(1, 0, 1, "b", "bob", 100),
            op(2, 0, 1, "c", "carol", 100),
        ];
        assert_eq!(resolve(&ops).len(), 3);
    }

    fn permutations(rest: &[usize], acc: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if rest.is_empty() {
            out.push(acc.clone());
            return;
        }
        for (i, &x) in rest.iter().enumerate() {
            let mut next: Vec<usize> = rest.to_vec();
            next.remove(i);
            acc.push(x);
            permutations(&next, acc, out);
            acc.pop();
        }
    }
}
