//! Domain transaction parameters and execution receipts.
//!
//! [`TransactionParams`] is the wire-ready form of a transaction: the
//! caller (the SDK's operation layer) builds and signs it, the transport
//! layer serializes it into an envelope's `params` field without
//! inspecting it further.  [`TxReceipt`] is the structured result of a
//! receipt-returning call.

use {
    crate::envelope::{Result, WireError},
    serde::{Deserialize, Serialize},
};

/// Execution target for a transaction payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VmType {
    /// Plain value transfer, no code execution.
    #[default]
    Transfer,
    /// EVM-compatible contract engine.
    Evm,
    /// WASM contract engine.
    Wasm,
    /// Built-in native module.
    Native,
}

/// Wire-ready transaction parameters.
///
/// All fields are populated by the caller before reaching the transport
/// layer; in particular `signature` already covers the transaction body
/// and `simulate` must be `false` — simulation is not supported over the
/// streaming transport and is rejected before anything touches the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TransactionParams {
    /// Hex account address of the sender.
    pub from: String,
    /// Hex account address of the recipient or contract.
    pub to: String,
    /// Transferred value.
    pub value: u64,
    /// Contract payload (deploy bytecode, invoke arguments, ...).
    pub payload: Vec<u8>,
    /// Caller's signature over the transaction body.
    pub signature: Vec<u8>,
    /// Caller-assigned timestamp in nanoseconds.
    pub timestamp_nanos: u64,
    /// Simulation flag; must be `false`.
    pub simulate: bool,
    /// Caller-assigned nonce.
    pub nonce: u64,
    /// Opaque extra bytes carried alongside the transaction.
    pub extra: Vec<u8>,
    /// Numeric extra identifiers.
    pub extra_id_i64: Vec<i64>,
    /// String extra identifiers.
    pub extra_id_string: Vec<String>,
    /// Execution target.
    pub vm_type: VmType,
    /// Operation code for maintain-style calls.
    pub opcode: u32,
    /// Contract name, for calls addressed by name rather than address.
    pub contract_name: String,
}

impl TransactionParams {
    /// Encode into the opaque `params` bytes carried by a request envelope.
    pub fn to_params_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(WireError::Serialization)
    }

    /// Decode from envelope `params` bytes.
    pub fn from_params_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(WireError::Serialization)
    }
}

/// A single log entry emitted during contract execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptLog {
    /// Address of the contract that emitted the log.
    pub address: String,
    /// Indexed topics.
    pub topics: Vec<String>,
    /// Raw log data.
    pub data: Vec<u8>,
}

/// Structured result of a receipt-returning call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TxReceipt {
    /// Receipt format version.
    pub version: String,
    /// Hex hash of the transaction this receipt belongs to.
    pub tx_hash: String,
    /// Engine that executed the transaction.
    pub vm_type: VmType,
    /// Address of the deployed or invoked contract.
    pub contract_address: String,
    /// Name of the contract, when addressed by name.
    pub contract_name: String,
    /// Return value of the execution.
    pub ret: Vec<u8>,
    /// Logs emitted during execution.
    pub logs: Vec<ReceiptLog>,
    /// Whether the transaction executed successfully.
    pub valid: bool,
    /// Execution error message when `valid` is false.
    pub err_msg: String,
}

impl TxReceipt {
    /// Decode a receipt from envelope `result` bytes.
    pub fn from_result_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(WireError::Serialization)
    }

    /// Encode into envelope `result` bytes.
    pub fn to_result_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(WireError::Serialization)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
