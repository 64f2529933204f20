//! Binary envelopes for integrators that carry `sync` over their own transport.
//!
//! Frame format:
//! ```text
//! ┌──────────┬───────────────────────────────────────────┐
//! │ flag     │ body                                      │
//! │ 1 byte   │ bincode envelope, LZ4 if flag == 1        │
//! └──────────┴───────────────────────────────────────────┘
//! ```
//!
//! Bodies larger than the compression threshold are LZ4-compressed; small
//! polls stay uncompressed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::coordinator::{FailureKind, SyncError, SyncRequest, SyncResult};
use crate::state::DocumentKey;

const FLAG_PLAIN: u8 = 0;
const FLAG_LZ4: u8 = 1;

/// A client's sync request, addressed to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub client_id: Uuid,
    pub doc_key: DocumentKey,
    /// Client-side counter echoed in the reply
    pub clock: u64,
    pub request: SyncRequest,
}

impl SyncEnvelope {
    pub fn new(client_id: Uuid, doc_key: impl Into<DocumentKey>, clock: u64, request: SyncRequest) -> Self {
        Self {
            client_id,
            doc_key: doc_key.into(),
            clock,
            request,
        }
    }

    pub fn encode(&self, compression_threshold: usize) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self, compression_threshold)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode_frame(bytes)
    }
}

/// Outcome of one sync, as sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// Nothing to do
    UpToDate,
    Synced(SyncResult),
    Failed { kind: FailureKind, message: String },
}

impl Reply {
    /// Back into the shape returned by `SessionRegistry::sync`.
    ///
    /// A failure only keeps its kind and message.
    pub fn into_result(self) -> Result<Option<SyncResult>, (FailureKind, String)> {
        match self {
            Reply::UpToDate => Ok(None),
            Reply::Synced(result) => Ok(Some(result)),
            Reply::Failed { kind, message } => Err((kind, message)),
        }
    }
}

impl From<Result<Option<SyncResult>, SyncError>> for Reply {
    fn from(result: Result<Option<SyncResult>, SyncError>) -> Self {
        match result {
            Ok(None) => Reply::UpToDate,
            Ok(Some(result)) => Reply::Synced(result),
            Err(e) => Reply::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// The server's answer to a [`SyncEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub doc_key: DocumentKey,
    pub clock: u64,
    pub reply: Reply,
}

impl ReplyEnvelope {
    pub fn encode(&self, compression_threshold: usize) -> Result<Vec<u8>, ProtocolError> {
        encode_frame(self, compression_threshold)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode_frame(bytes)
    }
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error("unknown frame flag {0:#04x}")]
    UnknownFlag(u8),
    #[error("empty frame")]
    EmptyFrame,
}

fn encode_frame<M: Serialize>(message: &M, compression_threshold: usize) -> Result<Vec<u8>, ProtocolError> {
    let body = bincode::serde::encode_to_vec(message, bincode::config::standard())
        .map_err(|e| ProtocolError::Serialization(e.to_string()))?;

    let (flag, body) = if body.len() > compression_threshold {
        (FLAG_LZ4, lz4_flex::compress_prepend_size(&body))
    } else {
        (FLAG_PLAIN, body)
    };

    let mut frame = Vec::with_capacity(body.len() + 1);
    frame.push(flag);
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn decode_frame<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, ProtocolError> {
    let (&flag, body) = bytes.split_first().ok_or(ProtocolError::EmptyFrame)?;
    let decompressed;
    let body = match flag {
        FLAG_PLAIN => body,
        FLAG_LZ4 => {
            decompressed = lz4_flex::decompress_size_prepended(body)
                .map_err(|e| ProtocolError::Decompression(e.to_string()))?;
            &decompressed[..]
        }
        other => return Err(ProtocolError::UnknownFlag(other)),
    };
    let (message, _) = bincode::serde::decode_from_slice(body, bincode::config::standard())
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{Delta, Revision};

    fn sample_revision(lines: usize) -> Revision {
        let units = (0..lines).map(|i| format!("inserted line {i}\n")).collect();
        Revision::new(vec![Delta::insert(0, units), Delta::delete(2..3).unwrap()]).unwrap()
    }

    #[test]
    fn test_sync_envelope_roundtrip() {
        let client = Uuid::new_v4();
        let envelope = SyncEnvelope::new(client, "Main.WebHome", 42, SyncRequest::submit(3, sample_revision(2)));

        let encoded = envelope.encode(4096).unwrap();
        assert_eq!(encoded[0], FLAG_PLAIN);
        let decoded = SyncEnvelope::decode(&encoded).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.client_id, client);
        assert_eq!(decoded.clock, 42);
    }

    #[test]
    fn test_poll_is_small() {
        let envelope = SyncEnvelope::new(Uuid::new_v4(), "doc", 1, SyncRequest::poll(1));
        let encoded = envelope.encode(4096).unwrap();
        // flag + 16 byte uuid + key + varints
        assert!(encoded.len() < 32, "poll encoded to {} bytes", encoded.len());
    }

    #[test]
    fn test_large_body_is_compressed() {
        let envelope = SyncEnvelope::new(Uuid::new_v4(), "doc", 7, SyncRequest::submit(1, sample_revision(500)));
        let plain = envelope.encode(usize::MAX).unwrap();
        let packed = envelope.encode(64).unwrap();

        assert_eq!(plain[0], FLAG_PLAIN);
        assert_eq!(packed[0], FLAG_LZ4);
        assert!(packed.len() < plain.len());
        assert_eq!(SyncEnvelope::decode(&packed).unwrap(), envelope);
    }

    #[test]
    fn test_reply_roundtrip() {
        let replies = [
            Reply::UpToDate,
            Reply::Synced(SyncResult {
                version: 4,
                revision: Some(sample_revision(1)),
                accepted: true,
            }),
            Reply::Failed {
                kind: FailureKind::UnknownVersion,
                message: "unknown version 9".into(),
            },
        ];
        for reply in replies {
            let envelope = ReplyEnvelope {
                doc_key: DocumentKey::from("doc"),
                clock: 3,
                reply,
            };
            let decoded = ReplyEnvelope::decode(&envelope.encode(64).unwrap()).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_reply_from_sync_error() {
        let reply = Reply::from(Err(SyncError::UnknownVersion { requested: 9, current: 2 }));
        let (kind, message) = reply.into_result().unwrap_err();
        assert_eq!(kind, FailureKind::UnknownVersion);
        assert!(message.contains('9'));
    }

    #[test]
    fn test_reply_from_success() {
        assert_eq!(Reply::from(Ok(None)), Reply::UpToDate);
        assert_eq!(Reply::UpToDate.into_result(), Ok(None));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(SyncEnvelope::decode(&[]).unwrap_err(), ProtocolError::EmptyFrame);
        assert_eq!(SyncEnvelope::decode(&[9, 1, 2]).unwrap_err(), ProtocolError::UnknownFlag(9));
        assert!(matches!(
            SyncEnvelope::decode(&[FLAG_LZ4, 0xFF, 0xFF]),
            Err(ProtocolError::Decompression(_))
        ));
        assert!(matches!(
            SyncEnvelope::decode(&[FLAG_PLAIN, 0xFF, 0xFE, 0xFD]),
            Err(ProtocolError::Deserialization(_))
        ));
    }

    #[test]
    fn test_invalid_revision_is_rejected_on_decode() {
        // Overlapping deltas never come out of `Revision::new`; craft them raw.
        #[derive(Serialize)]
        struct RawDelta {
            start: usize,
            end: usize,
            revised: Vec<String>,
        }
        #[derive(Serialize)]
        struct RawRequest {
            base_version: u64,
            revision: Option<Vec<RawDelta>>,
        }
        #[derive(Serialize)]
        struct RawEnvelope {
            client_id: Uuid,
            doc_key: String,
            clock: u64,
            request: RawRequest,
        }

        let raw = RawEnvelope {
            client_id: Uuid::nil(),
            doc_key: "doc".into(),
            clock: 0,
            request: RawRequest {
                base_version: 1,
                revision: Some(vec![
                    RawDelta { start: 0, end: 3, revised: vec![] },
                    RawDelta { start: 1, end: 2, revised: vec![] },
                ]),
            },
        };
        let bytes = encode_frame(&raw, usize::MAX).unwrap();
        assert!(matches!(
            SyncEnvelope::decode(&bytes),
            Err(ProtocolError::Deserialization(_))
        ));
    }
}
