//! Rebasing a revision over a concurrent one.
//!
//! Both revisions are computed against the same base `B`. `relocate(ours,
//! theirs)` returns a revision that applies to `patch(theirs, B)` and carries
//! the intent of `ours`.
//!
//! Positions are gaps between units, `0..=len`. Every delta of `theirs` that
//! lies wholly before a position shifts it by that delta's length change.
//!
//! ```text
//! base:    a  b  c  d
//! theirs:     └─→ X Y          [1,2) → [X, Y]   (+1)
//! ours:             └─→ Z      [3,4) → [Z]
//! ours':               └─→ Z   [4,5) → [Z]
//! ```
//!
//! Overlaps never fail:
//! - an insertion competing with one of theirs at the same gap goes first;
//! - a replaced range only consumes base units that survived in `theirs`;
//!   units theirs replaced or separated by an insertion are left alone, so
//!   both sides' content ends up interleaved;
//! - a replaced range with no surviving unit degrades to an insertion.
//!
//! Identical concurrent edits compound: both `"flower" → "flowers"` rebased
//! on each other give `"flowerss"`.

use std::ops::Range;

use crate::revision::{Delta, Revision};

/// Rebase `to_move` so it applies on top of `concurrent`.
pub fn relocate<T: Clone>(to_move: &Revision<T>, concurrent: &Revision<T>) -> Revision<T> {
    let mut deltas: Vec<Delta<T>> = Vec::with_capacity(to_move.len());

    for delta in to_move {
        if delta.is_insert() {
            let at = map_gap(concurrent, delta.start());
            push_merged(&mut deltas, Delta::from_parts(at, at, delta.revised().to_vec()));
            continue;
        }

        let segments = surviving_segments(concurrent, delta.original_range());
        match segments.split_first() {
            None => {
                let at = map_gap(concurrent, delta.start());
                log::trace!(
                    "relocate: {:?} fully overlapped, inserting at {at}",
                    delta.original_range()
                );
                push_merged(&mut deltas, Delta::from_parts(at, at, delta.revised().to_vec()));
            }
            Some((first, rest)) => {
                push_merged(
                    &mut deltas,
                    Delta::from_parts(first.start, first.end, delta.revised().to_vec()),
                );
                for segment in rest {
                    deltas.push(Delta::from_parts(segment.start, segment.end, Vec::new()));
                }
            }
        }
    }

    Revision::from_sorted(deltas)
}

/// Running offset from concurrent deltas already passed.
#[derive(Debug, Clone, Copy, Default)]
struct Shift {
    added: usize,
    removed: usize,
}

impl Shift {
    fn pass<T>(&mut self, delta: &Delta<T>) {
        self.added += delta.added();
        self.removed += delta.removed();
    }

    /// `pos` is always at or after every range already passed, so the
    /// subtraction cannot underflow.
    fn apply(&self, pos: usize) -> usize {
        pos + self.added - self.removed
    }
}

/// Map a base gap into `concurrent`'s result, landing before any concurrent
/// content that competes for the same spot.
fn map_gap<T>(concurrent: &Revision<T>, pos: usize) -> usize {
    let mut shift = Shift::default();
    for c in concurrent {
        if c.is_insert() {
            if c.start() < pos {
                shift.pass(c);
                continue;
            }
            break;
        }
        if c.end() <= pos {
            shift.pass(c);
            continue;
        }
        if c.start() < pos {
            // Strictly inside a concurrently replaced range.
            return shift.apply(c.start());
        }
        break;
    }
    shift.apply(pos)
}

/// Base units of `range` untouched by `concurrent`, as contiguous ranges in
/// the coordinates of `concurrent`'s result.
fn surviving_segments<T>(concurrent: &Revision<T>, range: Range<usize>) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut shift = Shift::default();
    let mut cursor = range.start;

    let mut emit = |from: usize, to: usize, shift: &Shift| {
        if from < to {
            let start = shift.apply(from);
            segments.push(start..start + (to - from));
        }
    };

    for c in concurrent {
        if cursor >= range.end {
            break;
        }
        if c.is_insert() {
            if c.start() <= cursor {
                shift.pass(c);
                continue;
            }
            if c.start() >= range.end {
                break;
            }
            // An insertion inside our range splits it.
            emit(cursor, c.start(), &shift);
            cursor = c.start();
            shift.pass(c);
            continue;
        }
        if c.end() <= cursor {
            shift.pass(c);
            continue;
        }
        if c.start() >= range.end {
            break;
        }
        emit(cursor, c.start().max(cursor), &shift);
        cursor = c.end();
        shift.pass(c);
    }
    emit(cursor, range.end, &shift);

    segments
}

/// Append `delta`, folding it into a previous insertion at the same gap.
fn push_merged<T: Clone>(deltas: &mut Vec<Delta<T>>, delta: Delta<T>) {
    if let Some(last) = deltas.last_mut() {
        if last.is_insert() && delta.is_insert() && last.start() == delta.start() {
            let mut revised = last.revised().to_vec();
            revised.extend_from_slice(delta.revised());
            *last = Delta::from_parts(last.start(), last.end(), revised);
            return;
        }
    }
    deltas.push(delta);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{join, split, Granularity};
    use crate::diff::{diff, patch};

    /// Merge two edits of `base` the way the sync engine does: `first` is
    /// committed, `second` is relocated over it.
    fn merge(base: &str, first: &str, second: &str, granularity: Granularity) -> String {
        let base_units = split(base, granularity);
        let theirs = diff(&base_units, &split(first, granularity));
        let ours = diff(&base_units, &split(second, granularity));
        let committed = patch(&theirs, &base_units).unwrap();
        let relocated = relocate(&ours, &theirs);
        join(&patch(&relocated, &committed).unwrap())
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_concurrent_line_inserts_at_same_gap() {
        let merged = merge("A\n", "A\nB\n", "A\nC\n", Granularity::Line);
        assert_eq!(merged, "A\nC\nB\n");
    }

    #[test]
    fn test_concurrent_char_inserts_at_same_gap() {
        assert_eq!(merge("A\n", "A B\n", "A C\n", Granularity::Char), "A C B\n");
        assert_eq!(merge("A\n", "AB\n", "AC\n", Granularity::Char), "ACB\n");
    }

    #[test]
    fn test_disjoint_edits_both_survive() {
        let merged = merge(
            "A B C D E\n",
            "A X B C D E\n",
            "A B C D Y E\n",
            Granularity::Char,
        );
        assert_eq!(merged, "A X B C D Y E\n");
    }

    #[test]
    fn test_identical_edits_compound() {
        let merged = merge("flower\n", "flowers\n", "flowers\n", Granularity::Char);
        assert_eq!(merged, "flowerss\n");
    }

    #[test]
    fn test_shift_after_growth_and_shrink() {
        let merged = merge(
            "a\nb\nc\nd\ne\n",
            "a\nB1\nB2\nc\nd\ne\n",
            "a\nb\nc\nD\ne\n",
            Granularity::Line,
        );
        assert_eq!(merged, "a\nB1\nB2\nc\nD\ne\n");

        let merged = merge("a\nb\nc\nd\ne\n", "a\ne\n", "a\nb\nc\nd\ne\nf\n", Granularity::Line);
        assert_eq!(merged, "a\ne\nf\n");
    }

    #[test]
    fn test_edit_before_concurrent_edit_is_unshifted() {
        let merged = merge("a\nb\nc\n", "a\nb\nC\n", "A\nb\nc\n", Granularity::Line);
        assert_eq!(merged, "A\nb\nC\n");
    }

    #[test]
    fn test_same_line_replaced_twice_interleaves() {
        let merged = merge("A\n", "A B\n", "A C\n", Granularity::Line);
        assert_eq!(merged, "A C\nA B\n");
    }

    #[test]
    fn test_partial_overlap_keeps_concurrent_content() {
        // theirs rewrites b..c, ours rewrites c..d.
        let merged = merge("a\nb\nc\nd\ne\n", "a\nX\nd\ne\n", "a\nb\nY\ne\n", Granularity::Line);
        assert_eq!(merged, "a\nX\nY\ne\n");
    }

    #[test]
    fn test_concurrent_insert_inside_replaced_range() {
        let base = lines(&["a", "b", "c", "d"]);
        let theirs = Revision::new(vec![Delta::insert(2, lines(&["T"]))]).unwrap();
        let ours = Revision::new(vec![Delta::new(1..3, lines(&["O"])).unwrap()]).unwrap();

        let relocated = relocate(&ours, &theirs);
        assert_eq!(
            relocated.deltas(),
            &[
                Delta::new(1..2, lines(&["O"])).unwrap(),
                Delta::delete(3..4).unwrap(),
            ]
        );
        let committed = patch(&theirs, &base).unwrap();
        let merged = patch(&relocated, &committed).unwrap();
        assert_eq!(merged, lines(&["a", "O", "T", "d"]));
    }

    #[test]
    fn test_concurrent_insert_at_range_start_is_skipped() {
        let base = lines(&["a", "b", "c"]);
        let theirs = Revision::new(vec![Delta::insert(1, lines(&["T"]))]).unwrap();
        let ours = Revision::new(vec![Delta::delete(1..2).unwrap()]).unwrap();

        let relocated = relocate(&ours, &theirs);
        let merged = patch(&relocated, &patch(&theirs, &base).unwrap()).unwrap();
        assert_eq!(merged, lines(&["a", "T", "c"]));
    }

    #[test]
    fn test_fully_covered_edits_share_one_insertion() {
        let base = lines(&["a", "b", "c", "d", "e"]);
        let theirs = Revision::new(vec![Delta::new(0..5, lines(&["Z"])).unwrap()]).unwrap();
        let ours = Revision::new(vec![
            Delta::new(1..2, lines(&["B"])).unwrap(),
            Delta::insert(3, lines(&["I"])),
        ])
        .unwrap();

        let relocated = relocate(&ours, &theirs);
        assert_eq!(relocated.deltas(), &[Delta::insert(0, lines(&["B", "I"]))]);
        let merged = patch(&relocated, &patch(&theirs, &base).unwrap()).unwrap();
        assert_eq!(merged, lines(&["B", "I", "Z"]));
    }

    #[test]
    fn test_relocate_over_empty_is_identity() {
        let ours = Revision::new(vec![Delta::new(0..1, lines(&["x"])).unwrap()]).unwrap();
        assert_eq!(relocate(&ours, &Revision::empty()), ours);
        assert!(relocate(&Revision::<String>::empty(), &ours).is_empty());
    }

    #[test]
    fn test_relocated_revision_always_fits() {
        let bases = ["a\nb\nc\nd\ne\nf\n", "x\n", "", "1\n2\n3\n"];
        let edits = [
            "a\nb\nc\nd\ne\nf\n",
            "b\nd\nf\n",
            "z\na\nb\nc\nd\ne\nf\ng\n",
            "",
            "a\nX\nY\nf\n",
            "1\n2\n",
        ];
        for base in bases {
            let base_units = split(base, Granularity::Line);
            for first in edits {
                for second in edits {
                    let theirs = diff(&base_units, &split(first, Granularity::Line));
                    let ours = diff(&base_units, &split(second, Granularity::Line));
                    let committed = patch(&theirs, &base_units).unwrap();
                    let relocated = relocate(&ours, &theirs);
                    let merged = patch(&relocated, &committed);
                    assert!(
                        merged.is_ok(),
                        "base {base:?}, theirs {first:?}, ours {second:?}"
                    );
                    assert!(Revision::new(relocated.into_deltas()).is_ok());
                }
            }
        }
    }
}
