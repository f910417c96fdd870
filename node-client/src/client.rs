//! Method client facades and the per-method pool registry.
//!
//! Each facade owns one [`StreamPool`] per distinct method variant
//! (fire-and-forget vs. wait-for-receipt), created lazily through a keyed
//! registry so concurrent first callers converge on a single pool instead
//! of racing to build duplicates.  Every operation checks a stream out,
//! runs one session round trip, and checks the stream back in on every
//! exit path.

use {
    crate::{
        config::ClientConfig,
        error::{ClientError, Result},
        pool::StreamPool,
        resolver::NodeSelector,
        session::{self, AuthSigner, CertManager},
        stream::NodeDialer,
    },
    log::debug,
    meridian_client_types::{
        envelope::ResponseEnvelope,
        transaction::{TransactionParams, TxReceipt},
    },
    parking_lot::Mutex,
    std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    },
};

const TX_SEND: &str = "transaction/send";
const TX_SEND_RECEIPT: &str = "transaction/send_and_receipt";
const CONTRACT_DEPLOY: &str = "contract/deploy";
const CONTRACT_DEPLOY_RECEIPT: &str = "contract/deploy_and_receipt";
const CONTRACT_INVOKE: &str = "contract/invoke";
const CONTRACT_INVOKE_RECEIPT: &str = "contract/invoke_and_receipt";
const CONTRACT_MAINTAIN: &str = "contract/maintain";
const CONTRACT_MAINTAIN_RECEIPT: &str = "contract/maintain_and_receipt";
const DID_REGISTER: &str = "did/register";
const DID_REGISTER_RECEIPT: &str = "did/register_and_receipt";

/// Shared state behind every facade: validated configuration, the
/// resolved node set, and the optional signing collaborators.
pub struct ClientCore {
    config: ClientConfig,
    selector: Arc<NodeSelector>,
    auth: Option<AuthSigner>,
    cert: Option<CertManager>,
}

impl ClientCore {
    /// Validate the configuration and resolve the node set.
    ///
    /// Fails fast on configuration errors, before any pool or dial
    /// exists.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let selector = Arc::new(NodeSelector::from_config(&config)?);
        Ok(Self {
            config,
            selector,
            auth: None,
            cert: None,
        })
    }

    /// Enable request authentication with the given signer.
    pub fn with_auth(mut self, signer: AuthSigner) -> Self {
        self.auth = Some(signer);
        self
    }

    /// Enable certificate-based transport signing.
    pub fn with_cert(mut self, cert: CertManager) -> Self {
        self.cert = Some(cert);
        self
    }

    /// The validated client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The resolved node selector.
    pub fn selector(&self) -> &Arc<NodeSelector> {
        &self.selector
    }
}

/// Keyed method → pool registry owned by one facade.
struct PoolRegistry {
    core: Arc<ClientCore>,
    pools: Mutex<HashMap<&'static str, Arc<StreamPool>>>,
    closed: AtomicBool,
}

impl PoolRegistry {
    fn new(core: Arc<ClientCore>) -> Self {
        Self {
            core,
            pools: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the pool for `method`, creating it on first use.  The map lock
    /// spans the construction, so concurrent first callers all land on
    /// the same instance.
    fn get_or_create(&self, method: &'static str) -> Arc<StreamPool> {
        let mut pools = self.pools.lock();
        pools
            .entry(method)
            .or_insert_with(|| {
                debug!("{}: creating stream pool", method);
                let dialer = NodeDialer::new(
                    self.core.selector.clone(),
                    self.core.config.dial_timeout,
                    method,
                );
                Arc::new(StreamPool::new(dialer, &self.core.config))
            })
            .clone()
    }

    /// One full call: build envelope, acquire, round trip, release.
    async fn call_raw(
        &self,
        method: &'static str,
        tx: &TransactionParams,
    ) -> Result<ResponseEnvelope> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::PoolClosed);
        }
        // Envelope construction happens before checkout, so rejected
        // requests (simulate, serialization failures) touch neither the
        // pool nor the wire.
        let envelope = session::build_envelope(
            &self.core.config.namespace,
            self.core.auth.as_ref(),
            self.core.cert.as_ref(),
            tx,
        )?;

        let pool = self.get_or_create(method);
        let mut stream = Some(pool.acquire().await?);
        let result = session::round_trip(
            method,
            stream.as_mut(),
            &envelope,
            pool.max_message_size(),
        )
        .await;
        // The stream goes back on every exit path; release retires it if
        // the round trip poisoned it.
        pool.release(stream.take()).await;
        result
    }

    async fn call_hash(&self, method: &'static str, tx: &TransactionParams) -> Result<String> {
        let response = self.call_raw(method, tx).await?;
        session::decode_tx_hash(&response)
    }

    async fn call_receipt(
        &self,
        method: &'static str,
        tx: &TransactionParams,
    ) -> Result<TxReceipt> {
        let response = self.call_raw(method, tx).await?;
        session::decode_receipt(&response)
    }

    /// Close every owned pool, reporting the first error while still
    /// attempting the rest.
    async fn close_all(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let pools: Vec<Arc<StreamPool>> = self.pools.lock().values().cloned().collect();
        let mut first_err = None;
        for pool in pools {
            if let Err(e) = pool.close().await {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

// ── Facades ─────────────────────────────────────────────────────────────────

/// Transaction submission.
pub struct TransactionClient {
    pools: PoolRegistry,
}

impl TransactionClient {
    /// Create a facade over the shared client core.
    pub fn new(core: Arc<ClientCore>) -> Self {
        Self {
            pools: PoolRegistry::new(core),
        }
    }

    /// Submit a transaction; returns the hex transaction hash.
    pub async fn send(&self, tx: &TransactionParams) -> Result<String> {
        self.pools.call_hash(TX_SEND, tx).await
    }

    /// Submit a transaction and wait for its execution receipt.
    pub async fn send_and_receipt(&self, tx: &TransactionParams) -> Result<TxReceipt> {
        self.pools.call_receipt(TX_SEND_RECEIPT, tx).await
    }

    /// Close every pool this facade owns.
    pub async fn close(&self) -> Result<()> {
        self.pools.close_all().await
    }
}

/// Contract lifecycle operations.
pub struct ContractClient {
    pools: PoolRegistry,
}

impl ContractClient {
    /// Create a facade over the shared client core.
    pub fn new(core: Arc<ClientCore>) -> Self {
        Self {
            pools: PoolRegistry::new(core),
        }
    }

    /// Deploy a contract; returns the hex transaction hash.
    pub async fn deploy(&self, tx: &TransactionParams) -> Result<String> {
        self.pools.call_hash(CONTRACT_DEPLOY, tx).await
    }

    /// Deploy a contract and wait for its receipt.
    pub async fn deploy_and_receipt(&self, tx: &TransactionParams) -> Result<TxReceipt> {
        self.pools.call_receipt(CONTRACT_DEPLOY_RECEIPT, tx).await
    }

    /// Invoke a contract method; returns the hex transaction hash.
    pub async fn invoke(&self, tx: &TransactionParams) -> Result<String> {
        self.pools.call_hash(CONTRACT_INVOKE, tx).await
    }

    /// Invoke a contract method and wait for its receipt.
    pub async fn invoke_and_receipt(&self, tx: &TransactionParams) -> Result<TxReceipt> {
        self.pools.call_receipt(CONTRACT_INVOKE_RECEIPT, tx).await
    }

    /// Run a maintain operation (upgrade, freeze, unfreeze — selected by
    /// the transaction's opcode); returns the hex transaction hash.
    pub async fn maintain(&self, tx: &TransactionParams) -> Result<String> {
        self.pools.call_hash(CONTRACT_MAINTAIN, tx).await
    }

    /// Run a maintain operation and wait for its receipt.
    pub async fn maintain_and_receipt(&self, tx: &TransactionParams) -> Result<TxReceipt> {
        self.pools.call_receipt(CONTRACT_MAINTAIN_RECEIPT, tx).await
    }

    /// Close every pool this facade owns.
    pub async fn close(&self) -> Result<()> {
        self.pools.close_all().await
    }
}

/// Decentralized identity registration.
pub struct DidClient {
    pools: PoolRegistry,
}

impl DidClient {
    /// Create a facade over the shared client core.
    pub fn new(core: Arc<ClientCore>) -> Self {
        Self {
            pools: PoolRegistry::new(core),
        }
    }

    /// Register an identity document; returns the hex transaction hash.
    pub async fn register(&self, tx: &TransactionParams) -> Result<String> {
        self.pools.call_hash(DID_REGISTER, tx).await
    }

    /// Register an identity document and wait for its receipt.
    pub async fn register_and_receipt(&self, tx: &TransactionParams) -> Result<TxReceipt> {
        self.pools.call_receipt(DID_REGISTER_RECEIPT, tx).await
    }

    /// Close every pool this facade owns.
    pub async fn close(&self) -> Result<()> {
        self.pools.close_all().await
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
