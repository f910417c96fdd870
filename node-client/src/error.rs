//! Error types for the node client.

use {meridian_client_types::envelope::WireError, thiserror::Error};

/// Errors surfaced by the stream pool and session layer.
///
/// Two families reach callers: local failures (transport, serialization,
/// pool state, unsupported modes) and server-reported failures carrying
/// the node's response code.  [`ClientError::is_server`] distinguishes
/// them.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid configuration, rejected before any pool or dial exists.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level I/O error.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Wire encoding or decoding failed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Stream establishment exceeded the dial timeout.
    #[error("dial timeout after {timeout_ms}ms connecting to {addr}")]
    DialTimeout {
        /// The node address being dialed.
        addr: std::net::SocketAddr,
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// The pool has been closed; no further checkout is possible.
    #[error("stream pool is closed")]
    PoolClosed,

    /// No stream was available for the call.
    #[error("system is busy: no stream available")]
    SystemBusy,

    /// Simulated execution is not supported over the streaming transport.
    #[error("simulate mode is not supported")]
    SimulateUnsupported,

    /// The node reported success but the result bytes are malformed.
    #[error("invalid response payload: {0}")]
    InvalidResponse(String),

    /// Signing the authentication block or envelope failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// The node reported a non-success response code.
    #[error("server error {code}: {description}")]
    Server {
        /// Numeric response code.
        code: i32,
        /// The node's description of the failure.
        description: String,
    },
}

impl ClientError {
    /// Whether this is a failure reported by the node itself.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Whether this is a local/system failure (everything that is neither
    /// a server-reported code nor a construction-time config error).
    pub fn is_system(&self) -> bool {
        !matches!(self, Self::Server { .. } | Self::Config(_))
    }
}

/// Convenience result type for node client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let server = ClientError::Server {
            code: 1,
            description: "busy".to_string(),
        };
        assert!(server.is_server());
        assert!(!server.is_system());

        let busy = ClientError::SystemBusy;
        assert!(busy.is_system());
        assert!(!busy.is_server());

        let config = ClientError::Config("bad".to_string());
        assert!(!config.is_system());
        assert!(!config.is_server());
    }
}
