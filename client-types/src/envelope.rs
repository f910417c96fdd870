//! Request/response envelopes and wire framing.
//!
//! Every frame on a node stream is length-prefixed:
//!
//! ```text
//! [4 bytes: payload length (u32-le)] [N bytes: bincode payload]
//! ```
//!
//! The payload is a bincode-encoded [`RequestEnvelope`] on the way out and
//! a [`ResponseEnvelope`] on the way back.  The reader side consumes the
//! 4-byte header, validates the length against the configured maximum
//! message size, then reads exactly that many bytes.

use {
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

/// Response code a node returns for a successfully executed request.
///
/// Any other code is a server-reported failure; its meaning travels in the
/// response's `code_desc` field.
pub const SUCCESS_CODE: i32 = 0;

/// Errors produced while encoding or decoding wire frames.
#[derive(Error, Debug)]
pub enum WireError {
    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Frame exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max {max} bytes)")]
    FrameTooLarge {
        /// Actual payload size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Convenience result type for wire encoding operations.
pub type Result<T> = std::result::Result<T, WireError>;

// ── Envelope types ──────────────────────────────────────────────────────────

/// Caller authentication attached to a request when the SDK runs with
/// authentication enabled.
///
/// The signature covers the address bytes concatenated with the
/// little-endian timestamp, produced with the SDK's account key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthBlock {
    /// Hex account address of the requesting identity.
    pub address: String,
    /// Signing time in nanoseconds; strictly advances between requests.
    pub timestamp_nanos: u64,
    /// Signature over `address bytes || timestamp_nanos (le)`.
    pub signature: Vec<u8>,
}

/// Outer wrapper around a serialized domain request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// Logical chain namespace the request targets.
    pub namespace: String,
    /// Authentication block; `None` when authentication is disabled.
    pub auth: Option<AuthBlock>,
    /// Transport certificate bytes; empty when no certificate manager is
    /// configured.
    pub tcert: Vec<u8>,
    /// Hex signature over the serialized envelope, made with the
    /// certificate key; empty alongside an empty `tcert`.
    pub tcert_signature: String,
    /// Opaque serialized request parameters.
    pub params: Vec<u8>,
}

/// Outer wrapper around a node's reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// Namespace echoed back by the node.
    pub namespace: String,
    /// Response code; [`SUCCESS_CODE`] on success.
    pub code: i32,
    /// Human-readable description of `code`.
    pub code_desc: String,
    /// Opaque result bytes; only meaningful when `code` is
    /// [`SUCCESS_CODE`].
    pub result: Vec<u8>,
}

impl ResponseEnvelope {
    /// Whether the node reported success.
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

// ── Framing helpers ─────────────────────────────────────────────────────────

/// Prefix `payload` with its 4-byte little-endian length, rejecting
/// payloads over `max_size`.
fn frame(payload: Vec<u8>, max_size: usize) -> Result<Vec<u8>> {
    if payload.len() > max_size {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
            max: max_size,
        });
    }
    let len = payload.len() as u32;
    let mut buf = Vec::with_capacity(4usize.saturating_add(payload.len()));
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Read the length prefix from a 4-byte frame header.
pub fn read_frame_len(header: &[u8; 4]) -> usize {
    u32::from_le_bytes(*header) as usize
}

impl RequestEnvelope {
    /// Serialize this envelope to bytes using bincode.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(WireError::Serialization)
    }

    /// Deserialize an envelope from bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(WireError::Serialization)
    }

    /// Serialize with a 4-byte little-endian length prefix.
    pub fn serialize_framed(&self, max_size: usize) -> Result<Vec<u8>> {
        frame(self.serialize()?, max_size)
    }
}

impl ResponseEnvelope {
    /// Serialize this envelope to bytes using bincode.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(WireError::Serialization)
    }

    /// Deserialize an envelope from bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(WireError::Serialization)
    }

    /// Serialize with a 4-byte little-endian length prefix.
    pub fn serialize_framed(&self, max_size: usize) -> Result<Vec<u8>> {
        frame(self.serialize()?, max_size)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
