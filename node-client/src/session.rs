//! Envelope construction and the one-send/one-receive session protocol.
//!
//! The dispatcher turns a wire-ready [`TransactionParams`] into a signed
//! [`RequestEnvelope`], performs exactly one send and one receive on a
//! checked-out stream, and decodes the paired response.  Two result
//! shapes exist: the hash variant (hex of a 32-byte transaction hash) and
//! the receipt variant (a structured [`TxReceipt`]).  A non-success
//! response code short-circuits both without touching the result bytes.

use {
    crate::{
        error::{ClientError, Result},
        stream::PooledStream,
    },
    ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer},
    log::debug,
    meridian_client_types::{
        envelope::{AuthBlock, RequestEnvelope, ResponseEnvelope},
        transaction::{TransactionParams, TxReceipt},
    },
    std::{
        sync::atomic::{AtomicU64, Ordering},
        time::{SystemTime, UNIX_EPOCH},
    },
};

/// Current wall-clock time in nanoseconds since the epoch.
fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Signs request authentication blocks with the SDK's account key.
///
/// Timestamps advance strictly between signatures, even when the wall
/// clock stalls or steps backwards.
pub struct AuthSigner {
    address: String,
    keypair: Keypair,
    last_nanos: AtomicU64,
}

impl AuthSigner {
    /// Create a signer for `address` with an existing keypair.
    pub fn new(address: String, keypair: Keypair) -> Self {
        Self {
            address,
            keypair,
            last_nanos: AtomicU64::new(0),
        }
    }

    /// Create a signer from a 32-byte secret seed.
    pub fn from_seed(address: String, seed: &[u8; 32]) -> Result<Self> {
        let secret =
            SecretKey::from_bytes(seed).map_err(|e| ClientError::Signing(e.to_string()))?;
        let public = PublicKey::from(&secret);
        Ok(Self::new(address, Keypair { secret, public }))
    }

    /// The account address this signer authenticates as.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The public half of the signing key, for verification.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    /// Next signing timestamp: the wall clock, bumped past the previous
    /// value if needed so consecutive signatures never share one.
    fn next_timestamp(&self) -> u64 {
        let now = now_nanos();
        let prev = self
            .last_nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev.saturating_add(1)))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev.saturating_add(1))
    }

    /// Produce a fresh authentication block.
    pub fn sign_auth(&self) -> AuthBlock {
        let timestamp_nanos = self.next_timestamp();
        let signature = self
            .keypair
            .sign(&auth_message(&self.address, timestamp_nanos))
            .to_bytes()
            .to_vec();
        AuthBlock {
            address: self.address.clone(),
            timestamp_nanos,
            signature,
        }
    }
}

/// The byte sequence an [`AuthBlock`] signature covers.
pub fn auth_message(address: &str, timestamp_nanos: u64) -> Vec<u8> {
    let mut msg = Vec::with_capacity(address.len().saturating_add(8));
    msg.extend_from_slice(address.as_bytes());
    msg.extend_from_slice(&timestamp_nanos.to_le_bytes());
    msg
}

/// Signs whole envelopes with a transport certificate key.
pub struct CertManager {
    certificate: Vec<u8>,
    keypair: Keypair,
}

impl CertManager {
    /// Create a manager from loaded certificate bytes and its key.
    pub fn new(certificate: Vec<u8>, keypair: Keypair) -> Self {
        Self {
            certificate,
            keypair,
        }
    }

    /// Create a manager from certificate bytes and a 32-byte secret seed.
    pub fn from_seed(certificate: Vec<u8>, seed: &[u8; 32]) -> Result<Self> {
        let secret =
            SecretKey::from_bytes(seed).map_err(|e| ClientError::Signing(e.to_string()))?;
        let public = PublicKey::from(&secret);
        Ok(Self::new(certificate, Keypair { secret, public }))
    }

    /// The certificate attached to signed envelopes.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Hex signature over the serialized envelope bytes.
    pub fn sign_hex(&self, envelope_bytes: &[u8]) -> String {
        hex::encode(self.keypair.sign(envelope_bytes).to_bytes())
    }
}

// ── Envelope construction ───────────────────────────────────────────────────

/// Build the signed request envelope for a wire-ready transaction.
///
/// Simulate-flagged requests are rejected here, before anything is
/// serialized or sent.  When a certificate manager is present the
/// envelope is serialized with empty certificate fields, signed, and the
/// certificate plus hex signature attached.
pub fn build_envelope(
    namespace: &str,
    auth: Option<&AuthSigner>,
    cert: Option<&CertManager>,
    tx: &TransactionParams,
) -> Result<RequestEnvelope> {
    if tx.simulate {
        return Err(ClientError::SimulateUnsupported);
    }

    let mut envelope = RequestEnvelope {
        namespace: namespace.to_string(),
        auth: auth.map(AuthSigner::sign_auth),
        tcert: vec![],
        tcert_signature: String::new(),
        params: tx.to_params_bytes()?,
    };

    if let Some(cert) = cert {
        let unsigned = envelope.serialize()?;
        envelope.tcert_signature = cert.sign_hex(&unsigned);
        envelope.tcert = cert.certificate().to_vec();
    }

    Ok(envelope)
}

// ── Round trip ──────────────────────────────────────────────────────────────

/// Perform exactly one request/response exchange on a checked-out stream.
///
/// An absent stream (pool exhaustion upstream) fails with
/// [`ClientError::SystemBusy`] before any network I/O.  `method` is used
/// for diagnostic logging only.
pub async fn round_trip(
    method: &str,
    stream: Option<&mut PooledStream>,
    envelope: &RequestEnvelope,
    max_message_size: usize,
) -> Result<ResponseEnvelope> {
    let Some(stream) = stream else {
        return Err(ClientError::SystemBusy);
    };
    debug!("{}: request to {}", method, stream.peer());
    stream.send_envelope(envelope, max_message_size).await?;
    let response = stream.recv_envelope(max_message_size).await?;
    debug!(
        "{}: response code {} from {}",
        method,
        response.code,
        stream.peer()
    );
    Ok(response)
}

// ── Result decoding ─────────────────────────────────────────────────────────

/// Hash variant: on success, the result bytes are a 32-byte transaction
/// hash, returned hex-encoded.
pub fn decode_tx_hash(response: &ResponseEnvelope) -> Result<String> {
    check_success(response)?;
    if response.result.len() != 32 {
        return Err(ClientError::InvalidResponse(format!(
            "expected 32-byte transaction hash, got {} bytes",
            response.result.len()
        )));
    }
    Ok(hex::encode(&response.result))
}

/// Receipt variant: on success, the result bytes decode into a
/// [`TxReceipt`].
pub fn decode_receipt(response: &ResponseEnvelope) -> Result<TxReceipt> {
    check_success(response)?;
    Ok(TxReceipt::from_result_bytes(&response.result)?)
}

/// Map a non-success response code to a server error; the result bytes
/// are never interpreted in that case.
fn check_success(response: &ResponseEnvelope) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ClientError::Server {
            code: response.code,
            description: response.code_desc.clone(),
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
