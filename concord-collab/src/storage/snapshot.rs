//! Packed snapshots for superseded versions.
//!
//! Only the head of a document's history is read on every sync; older versions
//! are needed only when a lagging client syncs against them. They are kept
//! bincode-encoded and LZ4-compressed.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             DocumentSyncState                │
//! │                                              │
//! │  v1 ◄── v2 ◄── v3 ◄── … ◄── vN-1    vN       │
//! │  (packed, LZ4)                    (plain)    │
//! └──────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Snapshot packing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot encoding failed: {0}")]
    Encode(String),
    #[error("snapshot decompression failed: {0}")]
    Decompress(String),
    #[error("snapshot decoding failed: {0}")]
    Decode(String),
    #[error("snapshot holds {got} units, expected {expected}")]
    UnitCountMismatch { expected: u64, got: u64 },
}

/// A compressed snapshot of one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedSnapshot {
    /// Version this snapshot belongs to
    pub version: u64,
    /// Number of units in the snapshot
    pub units: u64,
    /// Encoded size before compression
    pub original_size: u64,
    /// LZ4-compressed bincode payload
    pub compressed: Vec<u8>,
}

impl PackedSnapshot {
    /// Encode and compress `units`.
    pub fn pack(version: u64, units: &[String]) -> Result<Self, SnapshotError> {
        let encoded = bincode::serde::encode_to_vec(units, bincode::config::standard())
            .map_err(|e| SnapshotError::Encode(e.to_string()))?;
        let compressed = lz4_flex::compress_prepend_size(&encoded);
        Ok(Self {
            version,
            units: units.len() as u64,
            original_size: encoded.len() as u64,
            compressed,
        })
    }

    /// Decompress and decode the snapshot.
    pub fn unpack(&self) -> Result<Vec<String>, SnapshotError> {
        let encoded = lz4_flex::decompress_size_prepended(&self.compressed)
            .map_err(|e| SnapshotError::Decompress(e.to_string()))?;
        let (units, _): (Vec<String>, usize) =
            bincode::serde::decode_from_slice(&encoded, bincode::config::standard())
                .map_err(|e| SnapshotError::Decode(e.to_string()))?;
        if units.len() as u64 != self.units {
            return Err(SnapshotError::UnitCountMismatch {
                expected: self.units,
                got: units.len() as u64,
            });
        }
        Ok(units)
    }

    /// Compression ratio (original / compressed).
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed.is_empty() {
            return 0.0;
        }
        self.original_size as f64 / self.compressed.len() as f64
    }

    /// Compressed size in bytes.
    pub fn compressed_size(&self) -> usize {
        self.compressed.len()
    }
}

/// One entry of a document's history.
#[derive(Debug, Clone)]
pub(crate) enum StoredSnapshot {
    Plain(Vec<String>),
    Packed(PackedSnapshot),
}

impl StoredSnapshot {
    /// Pack `units`, falling back to plain storage if encoding fails.
    pub(crate) fn store(version: u64, units: Vec<String>, compress: bool) -> Self {
        if !compress {
            return Self::Plain(units);
        }
        match PackedSnapshot::pack(version, &units) {
            Ok(packed) => Self::Packed(packed),
            Err(e) => {
                log::warn!("Keeping version {version} unpacked: {e}");
                Self::Plain(units)
            }
        }
    }

    pub(crate) fn load(&self) -> Result<Vec<String>, SnapshotError> {
        match self {
            Self::Plain(units) => Ok(units.clone()),
            Self::Packed(packed) => packed.unpack(),
        }
    }

    /// Bytes held in memory for this entry.
    pub(crate) fn footprint(&self) -> usize {
        match self {
            Self::Plain(units) => plain_size(units),
            Self::Packed(packed) => packed.compressed_size(),
        }
    }

    pub(crate) fn is_packed(&self) -> bool {
        matches!(self, Self::Packed(_))
    }
}

/// Text bytes held by a plain snapshot.
pub(crate) fn plain_size(units: &[String]) -> usize {
    units.iter().map(String::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(lines: usize) -> Vec<String> {
        (0..lines).map(|i| format!("line {i} of a wiki page\n")).collect()
    }

    #[test]
    fn test_pack_roundtrip() {
        let units = document(20);
        let packed = PackedSnapshot::pack(3, &units).unwrap();
        assert_eq!(packed.version, 3);
        assert_eq!(packed.units, 20);
        assert_eq!(packed.unpack().unwrap(), units);
    }

    #[test]
    fn test_empty_snapshot() {
        let packed = PackedSnapshot::pack(1, &[]).unwrap();
        assert!(packed.unpack().unwrap().is_empty());
    }

    #[test]
    fn test_repetitive_text_compresses() {
        let units = vec!["the same line again\n".to_string(); 500];
        let packed = PackedSnapshot::pack(1, &units).unwrap();
        assert!(
            packed.compression_ratio() > 5.0,
            "ratio {:.2}x too low for repetitive lines",
            packed.compression_ratio()
        );
    }

    #[test]
    fn test_corrupted_payload_is_reported() {
        let mut packed = PackedSnapshot::pack(1, &document(10)).unwrap();
        packed.compressed.truncate(packed.compressed.len() / 2);
        assert!(packed.unpack().is_err());
    }

    #[test]
    fn test_unit_count_is_checked() {
        let mut packed = PackedSnapshot::pack(1, &document(4)).unwrap();
        packed.units = 5;
        assert_eq!(
            packed.unpack().unwrap_err(),
            SnapshotError::UnitCountMismatch { expected: 5, got: 4 }
        );
    }

    #[test]
    fn test_stored_snapshot_plain_when_disabled() {
        let stored = StoredSnapshot::store(1, document(3), false);
        assert!(!stored.is_packed());
        assert_eq!(stored.footprint(), plain_size(&document(3)));
        assert_eq!(stored.load().unwrap(), document(3));
    }
}
