//! # concord-collab: Versioned document synchronization service
//!
//! Keeps the version history of every shared document and reconciles client
//! edits made against older versions with everything committed since.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    SessionRegistry                      │
//! │  ┌────────────┐   ┌──────────────────────────────────┐  │
//! │  │ContentStore│──►│ key → Mutex<DocumentSyncState>   │  │
//! │  └────────────┘   │        v1 v2 … (LZ4)  vN (head)  │  │
//! │                   └──────────────┬───────────────────┘  │
//! │                                  │                      │
//! │                          SyncCoordinator                │
//! │                  diff · relocate · patch (core)         │
//! └─────────────────────────────────────────────────────────┘
//!          ▲ SyncEnvelope                 │ ReplyEnvelope
//!          │        (bincode, LZ4)        ▼
//!          └────────── Replica ◄──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the per-request sync decision
//! - [`state`]: per-document version history
//! - [`registry`]: document sessions, lazily seeded from a content store
//! - [`storage`]: packed snapshots and the content store boundary
//! - [`protocol`]: binary envelopes for integrators
//! - [`replica`]: client-side document copy
//! - [`config`]: engine configuration

pub mod config;
pub mod coordinator;
pub mod protocol;
pub mod registry;
pub mod replica;
pub mod state;
pub mod storage;

pub use config::SyncConfig;
pub use coordinator::{FailureKind, SyncCoordinator, SyncError, SyncOutcome, SyncRequest, SyncResult};
pub use protocol::{ProtocolError, Reply, ReplyEnvelope, SyncEnvelope};
pub use registry::{RegistryStats, SessionRegistry, VersionedSnapshot};
pub use replica::Replica;
pub use state::{DocumentKey, DocumentSyncState, HistoryError, HistoryStats};
pub use storage::{ContentStore, MemoryContentStore, StoreError};
