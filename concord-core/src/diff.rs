//! Minimal diff and patch over unit sequences.
//!
//! `diff` runs Myers' algorithm (linear space, `O((N+M)·D)` time) from the
//! `similar` crate and groups every run of non-matching units into one
//! [`Delta`]. The result is deterministic and minimal: a delete and an insert
//! that touch are always one replacement.

use similar::algorithms::{myers, Capture};
use similar::DiffTag;
use thiserror::Error;

use crate::revision::{Delta, Revision};

/// Errors raised when a revision does not fit the content it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// A delta's range reaches past the end of the content
    #[error("delta {index} ends at {end} but content has {len} units")]
    Incompatible { index: usize, end: usize, len: usize },
}

/// Compute the revision turning `original` into `revised`.
pub fn diff<T: PartialEq + Clone>(original: &[T], revised: &[T]) -> Revision<T> {
    let mut capture = Capture::new();
    if let Err(never) = myers::diff(&mut capture, original, 0..original.len(), revised, 0..revised.len()) {
        match never {}
    }

    let mut deltas = Vec::new();
    // Open hunk: (original start, original end, revised start, revised end).
    let mut hunk: Option<(usize, usize, usize, usize)> = None;

    for op in capture.into_ops() {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            if let Some((os, oe, ns, ne)) = hunk.take() {
                deltas.push(Delta::from_parts(os, oe, revised[ns..ne].to_vec()));
            }
            continue;
        }
        hunk = Some(match hunk {
            Some((os, _, ns, _)) => (os, old.end, ns, new.end),
            None => (old.start, old.end, new.start, new.end),
        });
    }
    if let Some((os, oe, ns, ne)) = hunk {
        deltas.push(Delta::from_parts(os, oe, revised[ns..ne].to_vec()));
    }

    log::trace!(
        "diff: {} -> {} units, {} deltas",
        original.len(),
        revised.len(),
        deltas.len()
    );
    Revision::from_sorted(deltas)
}

/// Apply `revision` to `content`, left to right.
///
/// Fails when a delta's range does not fit inside `content`.
pub fn patch<T: Clone>(revision: &Revision<T>, content: &[T]) -> Result<Vec<T>, PatchError> {
    check_fits(revision, content.len())?;

    let capacity = (content.len() as isize + revision.length_change()).max(0) as usize;
    let mut out = Vec::with_capacity(capacity);
    let mut cursor = 0;

    for delta in revision {
        out.extend_from_slice(&content[cursor..delta.start()]);
        out.extend_from_slice(delta.revised());
        cursor = delta.end();
    }
    out.extend_from_slice(&content[cursor..]);
    Ok(out)
}

/// Check that every delta of `revision` lies within `len` units.
pub fn check_fits<T>(revision: &Revision<T>, len: usize) -> Result<(), PatchError> {
    // Deltas are sorted, so the first offender is the earliest one.
    match revision.iter().enumerate().find(|(_, d)| d.end() > len) {
        Some((index, delta)) => Err(PatchError::Incompatible {
            index,
            end: delta.end(),
            len,
        }),
        None => Ok(()),
    }
}
