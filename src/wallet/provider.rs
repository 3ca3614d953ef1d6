//!
//! Wallet provider seam and its JSON-RPC bridge binding.
//!
//! The wallet is an external agent holding the user's keys. The core only needs to ask it for
//! accounts, read and change its chain, and hear about changes it makes on its own. HTTP bridges
//! cannot push, so `JsonRpcWalletProvider::watch` samples the bridge and turns differences into
//! the same `accountsChanged`/`chainChanged` events an injected provider would fire.

use crate::config::ChainConfig;
use crate::ledger::Address;
use crate::rpc::{RpcClient, RpcError};
use crate::wallet::types::WalletEvent;

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Capacity of the wallet event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Capabilities consumed from a key-holding wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
	/// Ask the user to authorize accounts (may prompt).
	async fn request_accounts(&self) -> Result<Vec<Address>, RpcError>;

	/// Accounts already authorized, without prompting.
	async fn accounts(&self) -> Result<Vec<Address>, RpcError>;

	/// Chain id the wallet currently points at.
	async fn chain_id(&self) -> Result<u64, RpcError>;

	/// Ask the wallet to switch to `chain_id` (may prompt).
	async fn switch_chain(&self, chain_id: u64) -> Result<(), RpcError>;

	/// Ask the wallet to add `chain` to its known networks (may prompt).
	async fn add_chain(&self, chain: &ChainConfig) -> Result<(), RpcError>;

	/// Subscribe to `accountsChanged` / `chainChanged` events.
	fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Hex chain id in the form wallets expect (`0x279F`).
pub fn chain_id_hex(chain_id: u64) -> String {
	format!("0x{:X}", chain_id)
}

/// Wallet reached through an EIP-1193 JSON-RPC bridge
pub struct JsonRpcWalletProvider {
	rpc: RpcClient,
	events: broadcast::Sender<WalletEvent>,
}

impl JsonRpcWalletProvider {
	pub fn new(rpc: RpcClient) -> Self {
		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		Self { rpc, events }
	}

	/// Spawn a task that samples accounts and chain every `interval` and emits
	/// events on change. The first sample only establishes the baseline.
	///
	/// The task stops on its own once the provider is dropped; abort the
	/// returned handle to stop it earlier.
	pub fn watch(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
		let provider: Weak<Self> = Arc::downgrade(self);

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			let mut last_accounts: Option<Vec<Address>> = None;
			let mut last_chain: Option<u64> = None;

			loop {
				ticker.tick().await;
				let Some(provider) = provider.upgrade() else {
					debug!("Wallet provider dropped, stopping watcher");
					break;
				};

				match provider.accounts().await {
					Ok(accounts) => {
						if last_accounts.as_ref().is_some_and(|last| *last != accounts) {
							info!("Wallet accounts changed ({} authorized)", accounts.len());
							let _ = provider.events.send(WalletEvent::AccountsChanged(accounts.clone()));
						}
						last_accounts = Some(accounts);
					}
					Err(e) => debug!("Wallet account sample failed: {}", e),
				}

				match provider.chain_id().await {
					Ok(chain) => {
						if last_chain.is_some_and(|last| last != chain) {
							info!("Wallet chain changed to {}", chain);
							let _ = provider.events.send(WalletEvent::ChainChanged(chain));
						}
						last_chain = Some(chain);
					}
					Err(e) => debug!("Wallet chain sample failed: {}", e),
				}
			}
		})
	}
}

#[async_trait]
impl WalletProvider for JsonRpcWalletProvider {
	async fn request_accounts(&self) -> Result<Vec<Address>, RpcError> {
		self.rpc.request("eth_requestAccounts", json!([])).await
	}

	async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
		self.rpc.request("eth_accounts", json!([])).await
	}

	async fn chain_id(&self) -> Result<u64, RpcError> {
		self.rpc.chain_id().await
	}

	async fn switch_chain(&self, chain_id: u64) -> Result<(), RpcError> {
		self.rpc
			.request_raw(
				"wallet_switchEthereumChain",
				json!([{ "chainId": chain_id_hex(chain_id) }]),
			)
			.await
			.map(|_| ())
	}

	async fn add_chain(&self, chain: &ChainConfig) -> Result<(), RpcError> {
		self.rpc
			.request_raw("wallet_addEthereumChain", json!([chain]))
			.await
			.map(|_| ())
	}

	fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
		self.events.subscribe()
	}
}
