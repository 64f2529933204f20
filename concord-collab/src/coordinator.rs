//! The sync decision for one request against one document history.
//!
//! ```text
//!                     base == current            base < current
//!                  ┌───────────────────┬──────────────────────────────┐
//!  no revision     │ UpToDate → None   │ FastForward → diff(base,cur) │
//!                  ├───────────────────┼──────────────────────────────┤
//!  revision        │ Committed         │ Merged: relocate over        │
//!                  │ patch(base), +1   │ diff(base,cur), patch, +1,   │
//!                  │                   │ reply diff(base, merged)     │
//!                  └───────────────────┴──────────────────────────────┘
//! ```
//!
//! Every failure is raised before `commit`, so a failed sync leaves the
//! history untouched.

use concord_core::{check_fits, diff, patch, relocate, PatchError, Revision};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{DocumentKey, DocumentSyncState, HistoryError};
use crate::storage::StoreError;

/// What a client sends: the version it last saw and, optionally, its edit
/// computed against that version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub base_version: u64,
    pub revision: Option<Revision>,
}

impl SyncRequest {
    /// Ask for changes without submitting anything.
    pub fn poll(base_version: u64) -> Self {
        Self {
            base_version,
            revision: None,
        }
    }

    /// Submit `revision`, computed against `base_version`.
    pub fn submit(base_version: u64, revision: Revision) -> Self {
        Self {
            base_version,
            revision: Some(revision),
        }
    }
}

/// What the client needs to reach the server's state.
///
/// `revision` applies to the client's *base* snapshot (the one named in the
/// request), not to its locally edited content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub version: u64,
    pub revision: Option<Revision>,
    pub accepted: bool,
}

impl SyncResult {
    fn accepted(version: u64, revision: Option<Revision>) -> Self {
        Self {
            version,
            revision,
            accepted: true,
        }
    }
}

/// Which branch a sync took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Caller was current and sent nothing
    UpToDate,
    /// Caller was current; its revision became the next version
    Committed,
    /// Caller was behind and sent nothing
    FastForward,
    /// Caller was behind; its revision was relocated and committed
    Merged,
}

/// Coarse error category, stable across the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    UnknownVersion,
    IncompatiblePatch,
    Failure,
    TooManySessions,
    Store,
    SessionClosed,
}

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The caller's base version is not in the history
    #[error("unknown version {requested} (current version is {current})")]
    UnknownVersion { requested: u64, current: u64 },
    /// The caller's revision does not fit its base content
    #[error("incompatible patch: {0}")]
    IncompatiblePatch(#[from] PatchError),
    /// Lower-level fault while synchronizing
    #[error("synchronization failure")]
    Failure(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// No room for another document session
    #[error("session limit of {limit} reached")]
    TooManySessions { limit: usize },
    /// The content store could not seed a new session
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The document's session was closed while the request waited for it
    #[error("session of {key} is closed")]
    SessionClosed { key: DocumentKey },
}

impl From<HistoryError> for SyncError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::UnknownVersion { requested, current } => {
                SyncError::UnknownVersion { requested, current }
            }
            corrupted @ HistoryError::Corrupted { .. } => SyncError::Failure(Box::new(corrupted)),
        }
    }
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::UnknownVersion { .. } => FailureKind::UnknownVersion,
            SyncError::IncompatiblePatch(_) => FailureKind::IncompatiblePatch,
            SyncError::Failure(_) => FailureKind::Failure,
            SyncError::TooManySessions { .. } => FailureKind::TooManySessions,
            SyncError::Store(_) => FailureKind::Store,
            SyncError::SessionClosed { .. } => FailureKind::SessionClosed,
        }
    }

    /// The caller must drop unacknowledged edits and refetch the current
    /// snapshot before syncing again.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownVersion { .. }
                | SyncError::IncompatiblePatch(_)
                | SyncError::Failure(_)
                | SyncError::SessionClosed { .. }
        )
    }

    /// Repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::TooManySessions { .. } | SyncError::Store(_))
    }
}

/// Runs the sync state machine on a history the caller has exclusive access to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncCoordinator;

impl SyncCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Synchronize one client. `Ok(None)` means there is nothing to do.
    pub fn sync(
        &self,
        state: &mut DocumentSyncState,
        request: SyncRequest,
    ) -> Result<Option<SyncResult>, SyncError> {
        self.sync_with_outcome(state, request).map(|(_, result)| result)
    }

    /// Like [`SyncCoordinator::sync`], also reporting the branch taken.
    pub fn sync_with_outcome(
        &self,
        state: &mut DocumentSyncState,
        request: SyncRequest,
    ) -> Result<(SyncOutcome, Option<SyncResult>), SyncError> {
        if state.is_closed() {
            log::warn!("{}: rejected sync on a closed session", state.key());
            return Err(SyncError::SessionClosed {
                key: state.key().clone(),
            });
        }

        let current = state.current_version_number();
        let base = request.base_version;

        if !state.has_version(base) {
            log::warn!("{}: rejected sync from unknown version {base} (current {current})", state.key());
            return Err(SyncError::UnknownVersion {
                requested: base,
                current,
            });
        }

        if base == current {
            let Some(revision) = request.revision else {
                log::debug!("{}: client at version {current} is up to date", state.key());
                return Ok((SyncOutcome::UpToDate, None));
            };
            let content = patch(&revision, state.current_snapshot())?;
            let version = state.commit(content);
            log::debug!(
                "{}: committed {} deltas from version {base} as version {version}",
                state.key(),
                revision.len()
            );
            return Ok((SyncOutcome::Committed, Some(SyncResult::accepted(version, None))));
        }

        let base_snapshot = state.snapshot_at(base)?;
        let catch_up = changes(&base_snapshot, state.current_snapshot());

        let Some(revision) = request.revision else {
            log::debug!(
                "{}: fast-forwarding client from version {base} to {current} ({} deltas)",
                state.key(),
                catch_up.as_ref().map_or(0, Revision::len)
            );
            return Ok((
                SyncOutcome::FastForward,
                Some(SyncResult::accepted(current, catch_up)),
            ));
        };

        check_fits(&revision, base_snapshot.len())?;
        let effective = match &catch_up {
            Some(concurrent) => {
                let relocated = relocate(&revision, concurrent);
                log::trace!(
                    "{}: relocated {} deltas over {} concurrent deltas",
                    state.key(),
                    revision.len(),
                    concurrent.len()
                );
                relocated
            }
            None => revision,
        };
        let merged = patch(&effective, state.current_snapshot())?;
        let confirm = diff(&base_snapshot, &merged);
        let version = state.commit(merged);
        log::debug!(
            "{}: merged edit from version {base} over version {current} as version {version}",
            state.key()
        );
        Ok((
            SyncOutcome::Merged,
            Some(SyncResult::accepted(version, Some(confirm))),
        ))
    }
}

/// `diff(a, b)`, or `None` when the two are identical.
fn changes(a: &[String], b: &[String]) -> Option<Revision> {
    let revision = diff(a, b);
    (!revision.is_empty()).then_some(revision)
}
