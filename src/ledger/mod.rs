//! Ledger integration module for the message board contract
//!
//! This module provides the client and types for reading messages from, and writing messages to,
//! the on-chain message board. The ledger is an opaque remote service; this module only knows its
//! call shapes.

/// ABI encoding and decoding for the contract calls
pub mod abi;
/// `LedgerClient` seam and its JSON-RPC binding
mod client;
/// Addresses, messages and ledger errors
mod types;

pub use client::{LedgerClient, MessageBoardClient, revert_reason_from_provider};
pub use types::*;
