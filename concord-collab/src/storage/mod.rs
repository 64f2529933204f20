//! Storage for document sessions.
//!
//! - [`snapshot`]: LZ4-packed snapshots of superseded versions
//! - [`content`]: the `ContentStore` boundary that seeds new sessions

pub mod content;
pub mod snapshot;

pub use content::{ContentStore, MemoryContentStore, StoreError};
pub use snapshot::{PackedSnapshot, SnapshotError};
