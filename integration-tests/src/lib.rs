//! Meridian SDK integration tests
//!
//! End-to-end scenarios for the client transport layer, driven against an
//! in-process mock node that speaks the envelope wire protocol:
//!
//! 1. **Session protocol** — hash and receipt result decoding, server
//!    error short-circuiting, simulate rejection, authentication and
//!    certificate envelope population
//! 2. **Stream pooling** — bounded pool size under concurrent facade
//!    calls, stream reuse, lifetime-based recycling, close/drain behavior

pub mod mock_node;
