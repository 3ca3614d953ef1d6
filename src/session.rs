//!
//! Session context.
//!
//! `Session` owns every piece of per-process state (connection, message cache, posting slot,
//! contacts) and wires them together. Consumers hold a `Session`, read `view()` and issue the
//! commands; `teardown()` releases the timer and the wallet listener.

use crate::config::ChainConfig;
use crate::contacts::{Contact, ContactError, ContactRepository, ContactStore};
use crate::ledger::{Address, InclusionReceipt, LedgerClient, LedgerError, Message};
use crate::sync::{RefreshOutcome, SyncEngine, SyncEvent};
use crate::transaction::{PostError, Poster, PostingState};
use crate::utils;
use crate::wallet::{ConnectionError, ConnectionManager, ConnectionSnapshot, ConnectionState, WalletProvider};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::info;

/// Collaborators a session is built from.
pub struct SessionDeps {
	pub ledger: Arc<dyn LedgerClient>,
	/// `None` when no wallet is installed.
	pub wallet: Option<Arc<dyn WalletProvider>>,
	pub contacts: Arc<dyn ContactRepository>,
	pub chain: ChainConfig,
	pub poll_interval: Duration,
}

/// Point-in-time view of everything a consumer renders.
#[derive(Debug, Clone)]
pub struct SessionView {
	pub connection: ConnectionState,
	pub account: Option<Address>,
	/// Reason of the last failed connect.
	pub failure: Option<String>,
	/// The wallet changed network under the session; rebuild it.
	pub reload_required: bool,
	pub messages: Arc<Vec<Message>>,
	pub posting: PostingState,
	/// Reason of the last failed post, until the next one starts.
	pub post_failure: Option<String>,
}

pub struct Session {
	connection: Arc<ConnectionManager>,
	sync: SyncEngine,
	poster: Poster,
	contacts: Mutex<ContactStore>,
	torn_down: AtomicBool,
}

impl Session {
	/// Load contacts, attach to the wallet, restore an authorized session and start polling.
	pub async fn init(deps: SessionDeps) -> Self {
		let contacts = ContactStore::load(deps.contacts).await;

		let connection = ConnectionManager::new(deps.wallet, deps.chain);
		connection.attach();
		let restored = connection.restore().await;

		let sync = SyncEngine::new(deps.ledger.clone(), deps.poll_interval);
		let poster = Poster::new(deps.ledger, connection.clone(), Some(sync.clone()));
		sync.start();

		info!(
			"Session ready ({:?}, {} contacts)",
			restored.state,
			contacts.contacts().len()
		);

		Self {
			connection,
			sync,
			poster,
			contacts: Mutex::new(contacts),
			torn_down: AtomicBool::new(false),
		}
	}

	pub fn view(&self) -> SessionView {
		let ConnectionSnapshot {
			state,
			account,
			failure,
			reload_required,
			..
		} = self.connection.snapshot();

		SessionView {
			connection: state,
			account,
			failure,
			reload_required,
			messages: self.sync.messages(),
			posting: self.poster.state(),
			post_failure: self.poster.last_failure(),
		}
	}

	pub async fn connect(&self) -> Result<ConnectionSnapshot, ConnectionError> {
		self.connection.connect().await
	}

	/// Post `text` to `recipient` (blank for public) and wait for inclusion.
	pub async fn submit(&self, text: &str, recipient: &str) -> Result<InclusionReceipt, PostError> {
		self.poster.submit(text, recipient).await
	}

	pub async fn refresh(&self) -> Result<RefreshOutcome, LedgerError> {
		self.sync.refresh().await
	}

	pub async fn add_contact(&self, contact: Contact) -> Result<(), ContactError> {
		self.contacts.lock().await.add(contact).await
	}

	pub async fn remove_contact(&self, address: &str) {
		self.contacts.lock().await.remove(address).await
	}

	pub async fn contacts(&self) -> Vec<Contact> {
		self.contacts.lock().await.contacts().to_vec()
	}

	/// "You", the contact name, or the short address.
	pub async fn display_name(&self, address: &Address) -> String {
		let account = self.connection.snapshot().account;
		let contacts = self.contacts.lock().await;
		let name = contacts.lookup(&address.to_hex()).map(|c| c.name.as_str());
		utils::display_name(address, name, account.as_ref())
	}

	/// Same as `display_name`, with the zero address shown as "Public".
	pub async fn recipient_label(&self, recipient: &Address) -> String {
		let account = self.connection.snapshot().account;
		let contacts = self.contacts.lock().await;
		let name = contacts.lookup(&recipient.to_hex()).map(|c| c.name.as_str());
		utils::recipient_label(recipient, name, account.as_ref())
	}

	pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionSnapshot> {
		self.connection.subscribe()
	}

	pub fn subscribe_messages(&self) -> watch::Receiver<Arc<Vec<Message>>> {
		self.sync.subscribe_messages()
	}

	pub fn subscribe_posting(&self) -> watch::Receiver<PostingState> {
		self.poster.subscribe()
	}

	pub fn subscribe_sync_events(&self) -> broadcast::Receiver<SyncEvent> {
		self.sync.subscribe_events()
	}

	/// Stop polling and detach from the wallet. Safe to call more than once.
	pub fn teardown(&self) {
		if self.torn_down.swap(true, Ordering::SeqCst) {
			return;
		}
		self.sync.stop();
		self.connection.detach();
		info!("Session torn down");
	}
}

impl Drop for Session {
	fn drop(&mut self) {
		self.teardown();
	}
}
