//! Per-document version history.
//!
//! Versions are numbered from 1 (the content the session was opened with).
//! A history reopened after a close resumes numbering above every version the
//! closed one issued, so a number is never reused for a document.
//! History is append-only: `commit` is the only mutator and it never rewrites
//! or drops an earlier version.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::snapshot::{plain_size, SnapshotError, StoredSnapshot};

/// Identifier of a shared document (for example a wiki page reference).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for DocumentKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// History lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("version {requested} does not exist (current version is {current})")]
    UnknownVersion { requested: u64, current: u64 },
    #[error("version {version} is unreadable")]
    Corrupted {
        version: u64,
        #[source]
        source: SnapshotError,
    },
}

/// Memory accounting for one document's history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryStats {
    /// Number of versions (including the head)
    pub versions: u64,
    /// Versions held packed
    pub packed_versions: u64,
    /// Text bytes held by plain versions, head included
    pub plain_bytes: u64,
    /// Compressed bytes held by packed versions
    pub packed_bytes: u64,
}

/// Version history of one document.
#[derive(Debug)]
pub struct DocumentSyncState {
    key: DocumentKey,
    /// Number of the oldest version
    first_version: u64,
    /// Versions first..N-1
    history: Vec<StoredSnapshot>,
    /// Version N
    head: Vec<String>,
    compress: bool,
    closed: bool,
}

impl DocumentSyncState {
    /// Open a history whose version 1 is `initial`.
    pub fn new(key: impl Into<DocumentKey>, initial: Vec<String>) -> Self {
        Self::with_compression(key, initial, true)
    }

    /// Like [`DocumentSyncState::new`], choosing whether old versions are packed.
    pub fn with_compression(key: impl Into<DocumentKey>, initial: Vec<String>, compress: bool) -> Self {
        Self::resume(key, initial, 1, compress)
    }

    /// Open a history whose oldest version is `first_version`.
    pub fn resume(
        key: impl Into<DocumentKey>,
        initial: Vec<String>,
        first_version: u64,
        compress: bool,
    ) -> Self {
        Self {
            key: key.into(),
            first_version: first_version.max(1),
            history: Vec::new(),
            head: initial,
            compress,
            closed: false,
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Number of the newest version.
    pub fn current_version_number(&self) -> u64 {
        self.first_version + self.history.len() as u64
    }

    /// Number of the oldest version still held.
    pub fn first_version_number(&self) -> u64 {
        self.first_version
    }

    /// Content of the newest version.
    pub fn current_snapshot(&self) -> &[String] {
        &self.head
    }

    /// Content of `version`.
    pub fn snapshot_at(&self, version: u64) -> Result<Vec<String>, HistoryError> {
        let current = self.current_version_number();
        if version == current {
            return Ok(self.head.clone());
        }
        if !self.has_version(version) {
            return Err(HistoryError::UnknownVersion {
                requested: version,
                current,
            });
        }
        self.history[(version - self.first_version) as usize]
            .load()
            .map_err(|source| HistoryError::Corrupted { version, source })
    }

    /// Whether `version` exists in this history.
    pub fn has_version(&self, version: u64) -> bool {
        version >= self.first_version && version <= self.current_version_number()
    }

    /// Retire this history and return its last version number.
    ///
    /// Holders of the session can still read it, but must not commit.
    pub fn close(&mut self) -> u64 {
        self.closed = true;
        self.current_version_number()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append `content` as the next version and return its number.
    pub fn commit(&mut self, content: Vec<String>) -> u64 {
        let superseded = self.current_version_number();
        let previous = std::mem::replace(&mut self.head, content);
        self.history
            .push(StoredSnapshot::store(superseded, previous, self.compress));
        let version = self.current_version_number();
        log::trace!("{}: committed version {version}", self.key);
        version
    }

    /// Memory held by this history.
    pub fn stats(&self) -> HistoryStats {
        let mut stats = HistoryStats {
            versions: self.history.len() as u64 + 1,
            plain_bytes: plain_size(&self.head) as u64,
            ..HistoryStats::default()
        };
        for entry in &self.history {
            if entry.is_packed() {
                stats.packed_versions += 1;
                stats.packed_bytes += entry.footprint() as u64;
            } else {
                stats.plain_bytes += entry.footprint() as u64;
            }
        }
        stats
    }

    #[cfg(test)]
    pub(crate) fn corrupt_version(&mut self, version: u64) {
        if let Some(StoredSnapshot::Packed(packed)) = self.history.get_mut((version - self.first_version) as usize) {
            packed.compressed.truncate(2);
        }
    }
}
