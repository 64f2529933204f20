//! Engine configuration.

use concord_core::Granularity;
use serde::{Deserialize, Serialize};

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Unit used when text enters the engine (default: lines)
    pub granularity: Granularity,
    /// Pack superseded versions with LZ4 (default: true)
    pub compress_history: bool,
    /// Maximum concurrently open document sessions (None = unbounded)
    pub max_sessions: Option<usize>,
    /// Encoded envelopes larger than this are LZ4-compressed (default: 4KB)
    pub compression_threshold: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Line,
            compress_history: true,
            max_sessions: None,
            compression_threshold: 4 * 1024,
        }
    }
}

impl SyncConfig {
    /// Create config for testing (small limits, compression always on).
    pub fn for_testing() -> Self {
        Self {
            granularity: Granularity::Line,
            compress_history: true,
            max_sessions: Some(64),
            compression_threshold: 64,
        }
    }

    /// Same configuration with another unit granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.granularity, Granularity::Line);
        assert!(config.compress_history);
        assert!(config.max_sessions.is_none());
        assert_eq!(config.compression_threshold, 4096);
    }

    #[test]
    fn test_config_partial_json() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"granularity":"char","max_sessions":8}"#).unwrap();
        assert_eq!(config.granularity, Granularity::Char);
        assert_eq!(config.max_sessions, Some(8));
        assert!(config.compress_history);
    }

    #[test]
    fn test_with_granularity() {
        let config = SyncConfig::for_testing().with_granularity(Granularity::Char);
        assert_eq!(config.granularity, Granularity::Char);
        assert_eq!(config.max_sessions, Some(64));
    }
}
