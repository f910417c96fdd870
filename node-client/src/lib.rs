//! Meridian Node Client
//!
//! Client-side transport layer of the Meridian SDK.  It multiplexes many
//! logical requests over bounded pools of persistent node streams, wraps
//! each request in an authenticated (optionally certificate-signed)
//! envelope, and correlates the matching response:
//!
//! - **Stream pooling** — up to `stream_number` persistent streams per
//!   RPC method, created lazily, checked out exclusively, and retired
//!   once they outlive the configured lifetime or suffer a transport
//!   failure.
//! - **Session protocol** — one send and one receive per checkout; the
//!   result decodes either as a hex transaction hash or as a structured
//!   execution receipt, and any non-success response code surfaces as a
//!   server error without touching the result bytes.
//! - **Node selection** — a static, optionally subset-bound address list
//!   with client-side round-robin; no re-resolution or health checking.
//!
//! ```text
//!  caller ──▶ facade (TransactionClient / ContractClient / DidClient)
//!                │  pool registry: method → StreamPool
//!                ▼
//!          StreamPool::acquire ──▶ session round trip ──▶ release
//!                │                        │
//!                ▼                        ▼
//!          NodeDialer (round-robin)   RequestEnvelope / ResponseEnvelope
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`]   | `ClientConfig` validation, defaults, dev overrides |
//! | [`error`]    | Crate-wide error enum, system/server classification |
//! | [`resolver`] | Static node set, subset binding, round-robin cursor |
//! | [`stream`]   | Persistent streams, framing I/O, the node dialer |
//! | [`pool`]     | Bounded per-method stream pool |
//! | [`session`]  | Envelope construction, signing, result decoding |
//! | [`client`]   | Method facades and the keyed pool registry |

pub mod client;
pub mod config;
pub mod error;
pub mod pool;
pub mod resolver;
pub mod session;
pub mod stream;
