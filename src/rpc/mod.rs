//! JSON-RPC transport module
//!
//! This module provides the HTTP client and error types used to talk to both the public ledger
//! endpoint and the wallet bridge. Both speak Ethereum-flavoured JSON-RPC 2.0.

/// HTTP client for JSON-RPC requests
mod client;
/// Request, response and error types
mod types;

pub use client::{DEFAULT_REQUEST_TIMEOUT, RpcClient, format_quantity, parse_quantity};
pub use types::*;
