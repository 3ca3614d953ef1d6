mod manager;
mod provider;
pub mod state;
pub mod types;

pub use manager::ConnectionManager;
pub use provider::{JsonRpcWalletProvider, WalletProvider, chain_id_hex};
pub use state::{ConnectionEvent, ConnectionSnapshot, ConnectionState, transition};
pub use types::*;
