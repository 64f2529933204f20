//! # concord-core: Diff, patch and relocation for concurrent editing
//!
//! Pure algorithms over unit sequences (lines by default). No I/O, no locks.
//!
//! ## Architecture
//!
//! ```text
//!   base ──────── diff ────────► Revision (ours)
//!    │                               │
//!    │                               │ relocate
//!    ▼                               ▼
//!   base ── diff ──► Revision ──► Revision' ── patch ──► merged
//!          (theirs, already      (ours, rebased
//!           committed)            onto theirs)
//! ```
//!
//! ## Modules
//!
//! - [`revision`]: `Delta` and `Revision` value types
//! - [`diff`]: LCS line diff and `patch`
//! - [`relocate`]: rebasing one revision over a concurrent one
//! - [`content`]: splitting text into line or character units

pub mod content;
pub mod diff;
pub mod relocate;
pub mod revision;

// Re-exports for convenience
pub use content::{join, split, Granularity};
pub use diff::{check_fits, diff, patch, PatchError};
pub use relocate::relocate;
pub use revision::{Delta, Revision, RevisionError};
