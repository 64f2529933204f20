//! Deltas and revisions.
//!
//! A [`Delta`] replaces a half-open range `[start, end)` of an original unit
//! sequence with a list of revised units. A [`Revision`] is an ordered list of
//! non-overlapping deltas, all expressed in the coordinates of the same base.
//!
//! ```text
//! base:      a  b  c  d  e
//!               └──┘        Delta [1,3) → [X]
//!                        ↑  Delta [5,5) → [Y]   (insertion)
//! patched:   a  X  d  e  Y
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a revision from untrusted parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    /// A delta whose range starts after it ends
    #[error("invalid delta range [{start}, {end})")]
    InvalidRange { start: usize, end: usize },
    /// Two deltas out of order, overlapping, or inserting at the same gap
    #[error("delta {index} starting at {start} overlaps the previous delta ending at {previous_end}")]
    Overlapping {
        index: usize,
        previous_end: usize,
        start: usize,
    },
}

/// A single contiguous range replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DeltaRepr<T>")]
pub struct Delta<T = String> {
    start: usize,
    end: usize,
    revised: Vec<T>,
}

/// Unvalidated wire shape of a [`Delta`].
#[derive(Deserialize)]
struct DeltaRepr<T> {
    start: usize,
    end: usize,
    revised: Vec<T>,
}

impl<T> TryFrom<DeltaRepr<T>> for Delta<T> {
    type Error = RevisionError;

    fn try_from(repr: DeltaRepr<T>) -> Result<Self, Self::Error> {
        Delta::new(repr.start..repr.end, repr.revised)
    }
}

impl<T> Delta<T> {
    /// Replace `range` of the original with `revised`.
    pub fn new(range: Range<usize>, revised: Vec<T>) -> Result<Self, RevisionError> {
        if range.start > range.end {
            return Err(RevisionError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        Ok(Self::from_parts(range.start, range.end, revised))
    }

    /// Insert `units` before original unit `at`.
    pub fn insert(at: usize, units: Vec<T>) -> Self {
        Self::from_parts(at, at, units)
    }

    /// Remove `range` from the original.
    pub fn delete(range: Range<usize>) -> Result<Self, RevisionError> {
        Self::new(range, Vec::new())
    }

    pub(crate) fn from_parts(start: usize, end: usize, revised: Vec<T>) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            end,
            revised,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// The replaced range in base coordinates.
    pub fn original_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Number of base units this delta replaces.
    pub fn original_len(&self) -> usize {
        self.end - self.start
    }

    pub fn revised(&self) -> &[T] {
        &self.revised
    }

    pub fn into_revised(self) -> Vec<T> {
        self.revised
    }

    /// True when nothing from the base is replaced.
    pub fn is_insert(&self) -> bool {
        self.start == self.end
    }

    /// True when base units are removed and nothing is put in their place.
    pub fn is_delete(&self) -> bool {
        self.start < self.end && self.revised.is_empty()
    }

    /// A delta that changes nothing.
    pub fn is_noop(&self) -> bool {
        self.start == self.end && self.revised.is_empty()
    }

    /// Units added by this delta.
    pub(crate) fn added(&self) -> usize {
        self.revised.len()
    }

    /// Units removed by this delta.
    pub(crate) fn removed(&self) -> usize {
        self.end - self.start
    }

    /// Net change in sequence length.
    pub fn length_change(&self) -> isize {
        self.revised.len() as isize - self.original_len() as isize
    }
}

/// An ordered set of non-overlapping deltas against one base.
///
/// An empty revision means "no change" and is distinct from having no
/// revision at all (`Option<Revision>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Delta<T>>", into = "Vec<Delta<T>>")]
#[serde(bound(
    serialize = "T: Serialize + Clone",
    deserialize = "T: Deserialize<'de>"
))]
pub struct Revision<T = String> {
    deltas: Vec<Delta<T>>,
}

impl<T> Default for Revision<T> {
    fn default() -> Self {
        Self { deltas: Vec::new() }
    }
}

impl<T> TryFrom<Vec<Delta<T>>> for Revision<T> {
    type Error = RevisionError;

    fn try_from(deltas: Vec<Delta<T>>) -> Result<Self, Self::Error> {
        Revision::new(deltas)
    }
}

impl<T> From<Revision<T>> for Vec<Delta<T>> {
    fn from(revision: Revision<T>) -> Self {
        revision.deltas
    }
}

impl<T> Revision<T> {
    /// The "no change" revision.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a revision from client-supplied deltas.
    ///
    /// No-op deltas are dropped. Deltas must be sorted by start, must not
    /// overlap, and at most one insertion may target a given gap.
    pub fn new(deltas: Vec<Delta<T>>) -> Result<Self, RevisionError> {
        let deltas: Vec<Delta<T>> = deltas.into_iter().filter(|d| !d.is_noop()).collect();
        check_ordering(&deltas)?;
        Ok(Self { deltas })
    }

    /// Wrap deltas produced by this crate's own algorithms.
    pub(crate) fn from_sorted(deltas: Vec<Delta<T>>) -> Self {
        debug_assert!(check_ordering(&deltas).is_ok(), "unsorted deltas");
        Self { deltas }
    }

    pub fn deltas(&self) -> &[Delta<T>] {
        &self.deltas
    }

    pub fn into_deltas(self) -> Vec<Delta<T>> {
        self.deltas
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Delta<T>> {
        self.deltas.iter()
    }

    /// Number of deltas.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// True for the "no change" revision.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Net change in sequence length once applied.
    pub fn length_change(&self) -> isize {
        self.deltas.iter().map(Delta::length_change).sum()
    }

    /// Smallest base length this revision can be applied to.
    pub fn required_len(&self) -> usize {
        self.deltas.last().map_or(0, Delta::end)
    }
}

impl<T: Clone> Revision<T> {
    /// Apply this revision to `content`. See [`crate::diff::patch`].
    pub fn apply(&self, content: &[T]) -> Result<Vec<T>, crate::diff::PatchError> {
        crate::diff::patch(self, content)
    }
}

impl<T> IntoIterator for Revision<T> {
    type Item = Delta<T>;
    type IntoIter = std::vec::IntoIter<Delta<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Revision<T> {
    type Item = &'a Delta<T>;
    type IntoIter = std::slice::Iter<'a, Delta<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.iter()
    }
}

fn check_ordering<T>(deltas: &[Delta<T>]) -> Result<(), RevisionError> {
    for (index, pair) in deltas.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        let same_gap = prev.is_insert() && next.is_insert() && prev.start == next.start;
        if next.start < prev.end || same_gap {
            return Err(RevisionError::Overlapping {
                index: index + 1,
                previous_end: prev.end,
                start: next.start,
            });
        }
    }
    Ok(())
}
