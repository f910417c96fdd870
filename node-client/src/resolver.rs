//! Static node address resolution and round-robin selection.
//!
//! The selector is built once from the configured node list, optionally
//! narrowed to a caller-chosen subset of indices, and never re-resolved.
//! A node that becomes unreachable afterwards is only discovered when a
//! call against it fails.

use {
    crate::{
        config::ClientConfig,
        error::{ClientError, Result},
    },
    log::debug,
    std::{
        net::SocketAddr,
        sync::atomic::{AtomicUsize, Ordering},
    },
};

/// Resolved, immutable set of dial targets with a round-robin cursor.
#[derive(Debug)]
pub struct NodeSelector {
    addrs: Vec<SocketAddr>,
    cursor: AtomicUsize,
}

impl NodeSelector {
    /// Resolve the dial targets from the full node list and an optional
    /// bound subset.
    ///
    /// Every bound index must fall within `[0, addrs.len())`; an
    /// out-of-range index fails here, before any connection attempt.
    pub fn new(addrs: &[SocketAddr], bound: Option<&[usize]>) -> Result<Self> {
        if addrs.is_empty() {
            return Err(ClientError::Config(
                "at least one node address is required".to_string(),
            ));
        }
        let resolved = match bound {
            None => addrs.to_vec(),
            Some(indices) => {
                if indices.is_empty() {
                    return Err(ClientError::Config(
                        "bound_nodes must not be empty when set".to_string(),
                    ));
                }
                let mut subset = Vec::with_capacity(indices.len());
                for &idx in indices {
                    let addr = addrs.get(idx).ok_or_else(|| {
                        ClientError::Config(format!(
                            "bound node index {} out of range (total nodes {})",
                            idx,
                            addrs.len()
                        ))
                    })?;
                    subset.push(*addr);
                }
                subset
            }
        };
        debug!("resolved {} dial target(s)", resolved.len());
        Ok(Self {
            addrs: resolved,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Build a selector straight from a client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.node_addrs, config.bound_nodes.as_deref())
    }

    /// The resolved dial targets, in configuration order.
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Pick the next dial target, rotating round-robin over the resolved
    /// set.
    pub fn next(&self) -> SocketAddr {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.addrs[idx % self.addrs.len()]
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: u16) -> Vec<SocketAddr> {
        (0..n)
            .map(|i| SocketAddr::from(([127, 0, 0, 1], 9000u16.saturating_add(i))))
            .collect()
    }

    #[test]
    fn test_round_robin_rotation() {
        let list = addrs(3);
        let selector = NodeSelector::new(&list, None).unwrap();
        assert_eq!(selector.next(), list[0]);
        assert_eq!(selector.next(), list[1]);
        assert_eq!(selector.next(), list[2]);
        assert_eq!(selector.next(), list[0]);
    }

    #[test]
    fn test_bound_subset() {
        let list = addrs(4);
        let selector = NodeSelector::new(&list, Some(&[1, 3])).unwrap();
        assert_eq!(selector.addrs(), &[list[1], list[3]]);
        assert_eq!(selector.next(), list[1]);
        assert_eq!(selector.next(), list[3]);
        assert_eq!(selector.next(), list[1]);
    }

    #[test]
    fn test_bound_index_at_total_rejected() {
        let list = addrs(3);
        // Index == total is the first out-of-range value.
        assert!(NodeSelector::new(&list, Some(&[3])).is_err());
        assert!(NodeSelector::new(&list, Some(&[0, 5])).is_err());
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(NodeSelector::new(&[], None).is_err());
        let list = addrs(2);
        assert!(NodeSelector::new(&list, Some(&[])).is_err());
    }
}
