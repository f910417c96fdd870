//! Configuration for the node client.

use {
    crate::error::{ClientError, Result},
    std::{net::SocketAddr, path::PathBuf, time::Duration},
};

/// Transport security settings.
///
/// The client only carries and validates these; loading the trust anchor
/// and establishing the encrypted channel belong to the connection layer
/// above this crate.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Whether transport encryption is requested.
    pub enabled: bool,
    /// Path to the CA certificate used as the trust anchor.
    pub ca_path: Option<PathBuf>,
    /// Expected server name on the node's certificate.
    pub server_name: String,
}

/// Configuration for stream pools and node sessions.
///
/// Immutable once a client is constructed from it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Logical chain namespace stamped on every request envelope.
    pub namespace: String,

    /// Full list of node addresses the client may dial.
    pub node_addrs: Vec<SocketAddr>,

    /// Optional subset of `node_addrs` indices to bind to.  `None` binds
    /// all configured nodes.
    pub bound_nodes: Option<Vec<usize>>,

    /// Maximum number of streams per method pool.  Must be positive.
    pub stream_number: usize,

    /// Maximum age of a pooled stream before it is retired at check-in.
    /// Zero disables age-based eviction.
    pub stream_lifetime: Duration,

    /// How long a single dial attempt may take.
    pub dial_timeout: Duration,

    /// Maximum size of a single serialized envelope in bytes.
    pub max_message_size: usize,

    /// Transport security settings.
    pub tls: TlsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            namespace: "global".to_string(),
            node_addrs: vec!["127.0.0.1:8081".parse().expect("valid default node addr")],
            bound_nodes: None,
            stream_number: 10,
            stream_lifetime: Duration::from_secs(300),
            dial_timeout: Duration::from_secs(5),
            max_message_size: 1_048_576, // 1 MB
            tls: TlsConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a config suitable for local testing with short timeouts.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            namespace: "dev".to_string(),
            node_addrs: vec!["127.0.0.1:0".parse().expect("valid dev node addr")],
            bound_nodes: None,
            stream_number: 2,
            stream_lifetime: Duration::from_secs(60),
            dial_timeout: Duration::from_millis(500),
            max_message_size: 1_048_576,
            tls: TlsConfig::default(),
        }
    }

    /// Check the configuration, failing before any pool or connection is
    /// created.
    pub fn validate(&self) -> Result<()> {
        if self.stream_number == 0 {
            return Err(ClientError::Config(
                "stream_number must be positive".to_string(),
            ));
        }
        if self.node_addrs.is_empty() {
            return Err(ClientError::Config(
                "at least one node address is required".to_string(),
            ));
        }
        if let Some(bound) = &self.bound_nodes {
            if bound.is_empty() {
                return Err(ClientError::Config(
                    "bound_nodes must not be empty when set".to_string(),
                ));
            }
            for &idx in bound {
                if idx >= self.node_addrs.len() {
                    return Err(ClientError::Config(format!(
                        "bound node index {} out of range (total nodes {})",
                        idx,
                        self.node_addrs.len()
                    )));
                }
            }
        }
        if self.max_message_size == 0 {
            return Err(ClientError::Config(
                "max_message_size must be positive".to_string(),
            ));
        }
        if self.tls.enabled {
            if self.tls.ca_path.is_none() {
                return Err(ClientError::Config(
                    "tls requires a CA certificate path".to_string(),
                ));
            }
            if self.tls.server_name.is_empty() {
                return Err(ClientError::Config(
                    "tls requires the expected server name".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ClientConfig::default().validate().unwrap();
        ClientConfig::dev_default().validate().unwrap();
    }

    #[test]
    fn test_zero_streams_rejected() {
        let mut cfg = ClientConfig::dev_default();
        cfg.stream_number = 0;
        assert!(matches!(cfg.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_empty_nodes_rejected() {
        let mut cfg = ClientConfig::dev_default();
        cfg.node_addrs.clear();
        assert!(matches!(cfg.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_bound_index_out_of_range() {
        let mut cfg = ClientConfig::dev_default();
        // One node configured: index 1 == total is out of range, as is
        // anything beyond it.
        cfg.bound_nodes = Some(vec![1]);
        assert!(matches!(cfg.validate(), Err(ClientError::Config(_))));
        cfg.bound_nodes = Some(vec![usize::MAX]);
        assert!(matches!(cfg.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_bound_index_in_range() {
        let mut cfg = ClientConfig::dev_default();
        cfg.bound_nodes = Some(vec![0]);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_tls_requires_anchor_and_name() {
        let mut cfg = ClientConfig::dev_default();
        cfg.tls.enabled = true;
        assert!(matches!(cfg.validate(), Err(ClientError::Config(_))));
        cfg.tls.ca_path = Some(PathBuf::from("/etc/meridian/ca.pem"));
        assert!(matches!(cfg.validate(), Err(ClientError::Config(_))));
        cfg.tls.server_name = "node.meridian.example".to_string();
        cfg.validate().unwrap();
    }
}
