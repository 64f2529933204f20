//! Session registry: document key → version history.
//!
//! ```text
//! Client A ──┐
//!             ├── sync(key) ── sessions[key] ── Mutex<DocumentSyncState>
//! Client B ──┘                      │
//!                                   └── seeded from ContentStore on first touch
//! ```
//!
//! The map lock is held only to look up, insert or retire a session. The
//! whole read-diff-commit sequence of a sync runs under that document's own
//! mutex, so syncs of one document are serialized and different documents
//! proceed in parallel.
//!
//! Closing a session remembers the last version it issued. A reopened session
//! numbers its versions above that, so clients of the closed session get
//! `UnknownVersion` instead of being matched against unrelated content.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use concord_core::join;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::config::SyncConfig;
use crate::coordinator::{SyncCoordinator, SyncError, SyncOutcome, SyncRequest, SyncResult};
use crate::protocol::{Reply, ReplyEnvelope, SyncEnvelope};
use crate::state::{DocumentKey, DocumentSyncState, HistoryStats};
use crate::storage::ContentStore;

type Session = Arc<Mutex<DocumentSyncState>>;

/// Content of one version of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedSnapshot {
    pub version: u64,
    pub units: Vec<String>,
}

impl VersionedSnapshot {
    /// The snapshot as text.
    pub fn text(&self) -> String {
        join(&self.units)
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub syncs: u64,
    pub commits: u64,
    pub merges: u64,
    pub fast_forwards: u64,
    pub failures: u64,
    pub active_sessions: usize,
}

#[derive(Debug, Default)]
struct Counters {
    syncs: AtomicU64,
    commits: AtomicU64,
    merges: AtomicU64,
    fast_forwards: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    /// Count one sync; `None` is a failed one.
    fn record(&self, outcome: Option<SyncOutcome>) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Some(SyncOutcome::UpToDate) => return,
            Some(SyncOutcome::Committed) => &self.commits,
            Some(SyncOutcome::Merged) => &self.merges,
            Some(SyncOutcome::FastForward) => &self.fast_forwards,
            None => &self.failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct Sessions {
    open: HashMap<DocumentKey, Session>,
    /// Last version issued by the closed session of each key
    retired: HashMap<DocumentKey, u64>,
}

/// Maps document keys to their histories and runs syncs against them.
pub struct SessionRegistry {
    config: SyncConfig,
    store: Arc<dyn ContentStore>,
    sessions: RwLock<Sessions>,
    coordinator: SyncCoordinator,
    counters: Counters,
}

impl SessionRegistry {
    pub fn new(config: SyncConfig, store: Arc<dyn ContentStore>) -> Self {
        Self {
            config,
            store,
            sessions: RwLock::new(Sessions::default()),
            coordinator: SyncCoordinator::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Synchronize one client with `key`, opening the session if needed.
    pub async fn sync(
        &self,
        key: &DocumentKey,
        request: SyncRequest,
    ) -> Result<Option<SyncResult>, SyncError> {
        let result = match self.session(key).await {
            Ok(session) => {
                let mut state = session.lock().await;
                self.coordinator.sync_with_outcome(&mut state, request)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((outcome, result)) => {
                self.counters.record(Some(outcome));
                Ok(result)
            }
            Err(e) => {
                self.counters.record(None);
                log::warn!("{key}: sync failed: {e}");
                Err(e)
            }
        }
    }

    /// Open the session for `key` without syncing and return its head.
    pub async fn open(&self, key: &DocumentKey) -> Result<VersionedSnapshot, SyncError> {
        self.snapshot(key, None).await
    }

    /// Content of `version` of `key`, or of its newest version.
    pub async fn snapshot(
        &self,
        key: &DocumentKey,
        version: Option<u64>,
    ) -> Result<VersionedSnapshot, SyncError> {
        let session = self.session(key).await?;
        let state = session.lock().await;
        if state.is_closed() {
            return Err(SyncError::SessionClosed { key: key.clone() });
        }
        let version = version.unwrap_or_else(|| state.current_version_number());
        let units = state.snapshot_at(version)?;
        Ok(VersionedSnapshot { version, units })
    }

    /// End the editing session of `key`, dropping its history.
    ///
    /// A sync that already holds the session and commits first is kept in
    /// the retired numbering; any later one fails with `SessionClosed`.
    pub async fn close(&self, key: &DocumentKey) -> bool {
        // The map stays locked until the version is retired, so a concurrent
        // reopen cannot reuse its numbers.
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.open.remove(key) else {
            return false;
        };
        let last = session.lock().await.close();
        sessions.retired.insert(key.clone(), last);
        log::info!("{key}: session closed at version {last}");
        true
    }

    /// Keys of all open sessions, sorted.
    pub async fn active_documents(&self) -> Vec<DocumentKey> {
        let mut keys: Vec<_> = self.sessions.read().await.open.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// History accounting of an open session.
    pub async fn history_stats(&self, key: &DocumentKey) -> Option<HistoryStats> {
        let session = self.sessions.read().await.open.get(key).cloned()?;
        let stats = session.lock().await.stats();
        Some(stats)
    }

    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            syncs: self.counters.syncs.load(Ordering::Relaxed),
            commits: self.counters.commits.load(Ordering::Relaxed),
            merges: self.counters.merges.load(Ordering::Relaxed),
            fast_forwards: self.counters.fast_forwards.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            active_sessions: self.sessions.read().await.open.len(),
        }
    }

    /// Answer a decoded request envelope.
    pub async fn handle(&self, envelope: SyncEnvelope) -> ReplyEnvelope {
        log::trace!(
            "{}: request from client {} (clock {})",
            envelope.doc_key,
            envelope.client_id,
            envelope.clock
        );
        let reply = Reply::from(self.sync(&envelope.doc_key, envelope.request).await);
        ReplyEnvelope {
            doc_key: envelope.doc_key,
            clock: envelope.clock,
            reply,
        }
    }

    async fn session(&self, key: &DocumentKey) -> Result<Session, SyncError> {
        if let Some(session) = self.sessions.read().await.open.get(key) {
            return Ok(Arc::clone(session));
        }

        // Load outside the map lock; a racing opener may win, then this copy is dropped.
        let initial = self.store.load(key).await?;

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.open.get(key) {
            return Ok(Arc::clone(session));
        }
        if let Some(limit) = self.config.max_sessions {
            if sessions.open.len() >= limit {
                return Err(SyncError::TooManySessions { limit });
            }
        }

        let first_version = sessions.retired.get(key).map_or(1, |last| last + 1);
        log::info!(
            "{key}: session opened at version {first_version} with {} units",
            initial.len()
        );
        let state = DocumentSyncState::resume(
            key.clone(),
            initial,
            first_version,
            self.config.compress_history,
        );
        let session = Arc::new(Mutex::new(state));
        sessions.open.insert(key.clone(), Arc::clone(&session));
        Ok(session)
    }
}
