//! Client-side view of a synchronized document.
//!
//! A replica tracks the last version it acknowledged (`base`) and the user's
//! local content. `request` computes the edit since `base`; `apply` folds the
//! server's answer back in, rebasing any edits made while the request was in
//! flight.
//!
//! ```text
//!   base(v) ── request ──► server ── SyncResult(v') ──► apply
//!     │                                                  │
//!     └──── local edits keep going ──────────────────────┘
//! ```

use concord_core::{diff, join, patch, relocate, split, Granularity, PatchError};

use crate::coordinator::{SyncRequest, SyncResult};
use crate::registry::VersionedSnapshot;

/// One client's copy of a document.
#[derive(Debug, Clone)]
pub struct Replica {
    granularity: Granularity,
    version: u64,
    /// Content at `version`
    base: Vec<String>,
    /// What the user currently sees
    local: Vec<String>,
    /// Local content as it was when the last request was built
    in_flight: Option<Vec<String>>,
}

impl Replica {
    /// Start from a server snapshot.
    pub fn new(snapshot: VersionedSnapshot, granularity: Granularity) -> Self {
        Self {
            granularity,
            version: snapshot.version,
            local: snapshot.units.clone(),
            base: snapshot.units,
            in_flight: None,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn text(&self) -> String {
        join(&self.local)
    }

    /// Replace the local content with `text`.
    pub fn edit(&mut self, text: &str) {
        self.local = split(text, self.granularity);
    }

    /// Whether local content differs from the acknowledged version.
    pub fn has_local_changes(&self) -> bool {
        self.local != self.base
    }

    /// Build the next request: a poll, or a submission of local changes.
    pub fn request(&mut self) -> SyncRequest {
        let revision = diff(&self.base, &self.local);
        self.in_flight = Some(self.local.clone());
        if revision.is_empty() {
            SyncRequest::poll(self.version)
        } else {
            SyncRequest::submit(self.version, revision)
        }
    }

    /// Fold in the server's answer to the last request.
    pub fn apply(&mut self, result: Option<SyncResult>) -> Result<(), PatchError> {
        let sent = self.in_flight.take().unwrap_or_else(|| self.base.clone());
        let Some(result) = result else {
            return Ok(());
        };

        // No revision: the server holds exactly base + what was sent.
        let server = match &result.revision {
            Some(revision) => patch(revision, &self.base)?,
            None => sent.clone(),
        };

        if self.local != sent {
            let pending = diff(&sent, &self.local);
            let incoming = diff(&sent, &server);
            self.local = patch(&relocate(&pending, &incoming), &server)?;
        } else {
            self.local = server.clone();
        }
        log::trace!("replica moved from version {} to {}", self.version, result.version);
        self.base = server;
        self.version = result.version;
        Ok(())
    }

    /// Drop everything local and restart from `snapshot`.
    pub fn reset(&mut self, snapshot: VersionedSnapshot) {
        self.version = snapshot.version;
        self.local = snapshot.units.clone();
        self.base = snapshot.units;
        self.in_flight = None;
    }
}
