use crate::ledger::Address;
use crate::rpc::RpcError;

/// Notifications pushed by the wallet outside of any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
	/// `accountsChanged`: the authorized accounts, first one active. Empty means disconnected.
	AccountsChanged(Vec<Address>),
	/// `chainChanged`: the wallet now points at this chain id.
	ChainChanged(u64),
}

/// Error types for wallet connection and network enforcement
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
	#[error("No wallet provider found")]
	NoWalletProvider,

	#[error("Wallet authorization rejected: {0}")]
	AuthorizationRejected(String),

	#[error("Wallet is on chain {actual}, expected chain {expected}")]
	WrongNetwork { expected: u64, actual: u64 },

	#[error("Could not switch the wallet to the target network: {0}")]
	NetworkSwitchRejected(String),

	#[error("Wallet is not connected")]
	NotConnected,

	#[error("Connection attempt superseded by a wallet event")]
	Superseded,

	#[error("Wallet RPC error: {0}")]
	Rpc(#[from] RpcError),
}
