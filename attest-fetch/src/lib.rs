//! Attest's chain access and event decoding library.
//!
//! Treats the chain as an opaque append-only log source reached over
//! JsonRPC. Raw logs are decoded against per-contract schemas loaded from
//! external metadata at startup.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod jsonrpc;
