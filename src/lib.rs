//! Client core for an on-chain message board on the Monad testnet.
//!
//! - `wallet`: wallet connection state machine and the EIP-1193 bridge.
//! - `sync`: polling read cache of the board.
//! - `transaction`: single-flight posting of new messages.
//! - `contacts`: local address book.
//! - `session`: one context object tying the above together.

pub mod config;
pub mod contacts;
pub mod ledger;
pub mod rpc;
pub mod session;
pub mod sync;
pub mod transaction;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, ChainConfig, ConfigError};
pub use session::{Session, SessionDeps, SessionView};
