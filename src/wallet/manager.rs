//!
//! Connection manager: drives the wallet through connect, network enforcement and restoration.
//!
//! The manager owns the only `ConnectionSnapshot` and publishes every change on a watch channel.
//! All state changes go through `transition`; the async connect flow only produces events for it.

use crate::config::ChainConfig;
use crate::ledger::Address;
use crate::rpc::RpcError;
use crate::wallet::provider::WalletProvider;
use crate::wallet::state::{ConnectionEvent, ConnectionSnapshot, ConnectionState, transition};
use crate::wallet::types::{ConnectionError, WalletEvent};

use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owner of the wallet connection state machine
pub struct ConnectionManager {
	wallet: Option<Arc<dyn WalletProvider>>,
	chain: ChainConfig,
	current: Mutex<ConnectionSnapshot>,
	updates: watch::Sender<ConnectionSnapshot>,
	listener: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
	/// Create a manager for `chain`. `wallet` is `None` when no provider is installed.
	pub fn new(wallet: Option<Arc<dyn WalletProvider>>, chain: ChainConfig) -> Arc<Self> {
		let (updates, _) = watch::channel(ConnectionSnapshot::default());
		Arc::new(Self {
			wallet,
			chain,
			current: Mutex::new(ConnectionSnapshot::default()),
			updates,
			listener: Mutex::new(None),
		})
	}

	pub fn snapshot(&self) -> ConnectionSnapshot {
		self.current
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
		self.updates.subscribe()
	}

	pub fn target_chain(&self) -> &ChainConfig {
		&self.chain
	}

	/// Run one event through the reducer and publish the result.
	/// Returns the snapshots before and after.
	fn apply(&self, event: ConnectionEvent) -> (ConnectionSnapshot, ConnectionSnapshot) {
		let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
		let before = current.clone();
		let after = transition(&before, event);
		if after != before {
			debug!("Connection {:?} -> {:?}", before.state, after.state);
			*current = after.clone();
			self.updates.send_replace(after.clone());
		}
		(before, after)
	}

	fn fail(&self, attempt: u64, error: ConnectionError) -> ConnectionError {
		warn!("Wallet connection failed: {}", error);
		self.apply(ConnectionEvent::AttemptFailed {
			attempt,
			reason: error.to_string(),
		});
		error
	}

	/// Connect the wallet and make sure it is on the target network.
	///
	/// Returns immediately with the current snapshot if a connect flow is
	/// already running or the wallet is already connected.
	pub async fn connect(&self) -> Result<ConnectionSnapshot, ConnectionError> {
		let (before, started) = self.apply(ConnectionEvent::ConnectRequested);
		if started.attempt == before.attempt {
			debug!("Connect ignored in state {:?}", started.state);
			return Ok(started);
		}
		let attempt = started.attempt;

		let Some(wallet) = self.wallet.as_ref() else {
			return Err(self.fail(attempt, ConnectionError::NoWalletProvider));
		};

		let accounts = match wallet.request_accounts().await {
			Ok(accounts) => accounts,
			Err(e) if e.is_user_rejection() => {
				return Err(self.fail(attempt, ConnectionError::AuthorizationRejected(e.to_string())));
			}
			Err(e) => return Err(self.fail(attempt, ConnectionError::Rpc(e))),
		};
		let Some(account) = accounts.first().copied() else {
			return Err(self.fail(
				attempt,
				ConnectionError::AuthorizationRejected("wallet returned no accounts".to_string()),
			));
		};

		let chain_id = match wallet.chain_id().await {
			Ok(chain_id) => chain_id,
			Err(e) => return Err(self.fail(attempt, ConnectionError::Rpc(e))),
		};
		let on_target_network = chain_id == self.chain.chain_id;

		let (_, granted) = self.apply(ConnectionEvent::AccountsGranted {
			attempt,
			account,
			on_target_network,
		});
		self.ensure_current(&granted, attempt)?;

		if on_target_network {
			info!("Wallet connected as {}", account);
			return Ok(granted);
		}

		info!(
			"Wallet is on chain {}, requesting switch to {} ({})",
			chain_id, self.chain.chain_id, self.chain.chain_name
		);

		if let Err(e) = self.switch_network(wallet.as_ref()).await {
			return Err(self.fail(attempt, ConnectionError::NetworkSwitchRejected(e.to_string())));
		}

		let (_, switched) = self.apply(ConnectionEvent::NetworkSwitched { attempt });
		self.ensure_current(&switched, attempt)?;

		info!("Wallet connected as {} after network switch", account);
		Ok(switched)
	}

	fn ensure_current(&self, snapshot: &ConnectionSnapshot, attempt: u64) -> Result<(), ConnectionError> {
		if snapshot.attempt != attempt {
			info!("Connect attempt {} superseded by a wallet event", attempt);
			return Err(ConnectionError::Superseded);
		}
		Ok(())
	}

	/// Switch to the target chain, adding it first if the wallet does not know it.
	async fn switch_network(&self, wallet: &dyn WalletProvider) -> Result<(), RpcError> {
		match wallet.switch_chain(self.chain.chain_id).await {
			Ok(()) => Ok(()),
			Err(e) if e.provider().is_some_and(|p| p.is_unrecognized_chain()) => {
				info!("Wallet does not know {}, requesting add", self.chain.chain_name);
				wallet.add_chain(&self.chain).await
			}
			Err(e) => Err(e),
		}
	}

	/// Pick up a session the wallet already authorized, without prompting.
	///
	/// Only restores when the wallet is already on the target network; a
	/// mismatch is left for an explicit `connect()`.
	pub async fn restore(&self) -> ConnectionSnapshot {
		let Some(wallet) = self.wallet.as_ref() else {
			debug!("No wallet provider, nothing to restore");
			return self.snapshot();
		};

		let account = match wallet.accounts().await {
			Ok(accounts) => accounts.first().copied(),
			Err(e) => {
				warn!("Could not query authorized accounts: {}", e);
				return self.snapshot();
			}
		};
		let Some(account) = account else {
			return self.snapshot();
		};

		match wallet.chain_id().await {
			Ok(chain_id) if chain_id == self.chain.chain_id => {
				info!("Restored wallet session for {}", account);
				self.apply(ConnectionEvent::SessionRestored { account }).1
			}
			Ok(chain_id) => {
				info!(
					"Authorized wallet is on chain {}, not restoring until connect",
					chain_id
				);
				self.snapshot()
			}
			Err(e) => {
				warn!("Could not query wallet chain: {}", e);
				self.snapshot()
			}
		}
	}

	/// Feed an event fired by the wallet into the state machine.
	pub fn handle_wallet_event(&self, event: WalletEvent) -> ConnectionSnapshot {
		match &event {
			WalletEvent::AccountsChanged(accounts) if accounts.is_empty() => {
				info!("Wallet disconnected");
			}
			WalletEvent::AccountsChanged(accounts) => {
				debug!("Wallet accounts changed: {:?}", accounts);
			}
			WalletEvent::ChainChanged(chain_id) => {
				info!("Wallet switched to chain {}", chain_id);
			}
		}

		let (_, after) = self.apply(ConnectionEvent::Wallet(event));
		if after.reload_required {
			warn!("Wallet network changed under a live session; session must be rebuilt");
		}
		after
	}

	/// Start listening to wallet events. Replaces any previous listener.
	pub fn attach(self: &Arc<Self>) {
		let Some(wallet) = self.wallet.as_ref() else {
			return;
		};
		let mut events = wallet.subscribe();
		let manager: Weak<Self> = Arc::downgrade(self);

		let handle = tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(event) => {
						let Some(manager) = manager.upgrade() else {
							break;
						};
						manager.handle_wallet_event(event);
					}
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!("Missed {} wallet events", skipped);
					}
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
			debug!("Wallet event listener stopped");
		});

		let previous = self
			.listener
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.replace(handle);
		if let Some(previous) = previous {
			previous.abort();
		}
	}

	/// Stop listening to wallet events.
	pub fn detach(&self) {
		let handle = self
			.listener
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		if let Some(handle) = handle {
			handle.abort();
		}
	}

	/// Re-check, against the wallet itself, that the session can sign on the
	/// target network. Returns the active account.
	pub async fn verify_network(&self) -> Result<Address, ConnectionError> {
		let snapshot = self.snapshot();
		let account = match (snapshot.state, snapshot.account) {
			(ConnectionState::Connected, Some(account)) => account,
			_ => return Err(ConnectionError::NotConnected),
		};
		let wallet = self.wallet.as_ref().ok_or(ConnectionError::NoWalletProvider)?;

		let actual = wallet.chain_id().await?;
		if actual != self.chain.chain_id {
			return Err(ConnectionError::WrongNetwork {
				expected: self.chain.chain_id,
				actual,
			});
		}
		Ok(account)
	}
}

impl Drop for ConnectionManager {
	fn drop(&mut self) {
		self.detach();
	}
}
