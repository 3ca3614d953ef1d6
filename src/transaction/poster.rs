//!
//! Posting coordinator.
//!
//! Validates a new message against the connection, submits it through the ledger client and
//! waits for inclusion. Only one submission can be in flight process-wide; the slot is claimed
//! before anything else so a second caller is turned away without touching the wallet.

use crate::ledger::{Address, InclusionReceipt, LedgerClient, LedgerError, ZERO_ADDRESS};
use crate::sync::SyncEngine;
use crate::transaction::reason::failure_reason;
use crate::wallet::{ConnectionError, ConnectionManager};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

/// Posting lifecycle. Both inclusion and failure return to `Idle`; the reason of a failed
/// submission travels in its `PostError` and stays readable through `Poster::last_failure`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PostingState {
	#[default]
	Idle,
	/// A submission is waiting for inclusion.
	Pending,
}

#[derive(Error, Debug)]
pub enum PostError {
	#[error(transparent)]
	Connection(#[from] ConnectionError),

	#[error("Invalid recipient address: {0}")]
	InvalidRecipient(String),

	#[error("Message is empty")]
	EmptyMessage,

	#[error("A message is already being posted")]
	AlreadyPending,

	#[error("Transaction reverted: {0}")]
	TransactionReverted(String),

	#[error("Transaction failed: {0}")]
	Rpc(String),
}

/// Releases the single posting slot when dropped.
struct SlotGuard<'a>(&'a AtomicBool);

impl Drop for SlotGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

/// Blank input means a public broadcast.
fn parse_recipient(input: &str) -> Result<Address, PostError> {
	let input = input.trim();
	if input.is_empty() {
		return Ok(ZERO_ADDRESS);
	}
	input
		.parse()
		.map_err(|_| PostError::InvalidRecipient(input.to_string()))
}

pub struct Poster {
	ledger: Arc<dyn LedgerClient>,
	connection: Arc<ConnectionManager>,
	/// Refreshed out of band after a successful post.
	sync: Option<SyncEngine>,
	in_flight: AtomicBool,
	state: watch::Sender<PostingState>,
	last_failure: Mutex<Option<String>>,
}

impl Poster {
	pub fn new(
		ledger: Arc<dyn LedgerClient>,
		connection: Arc<ConnectionManager>,
		sync: Option<SyncEngine>,
	) -> Self {
		let (state, _) = watch::channel(PostingState::Idle);
		Self {
			ledger,
			connection,
			sync,
			in_flight: AtomicBool::new(false),
			state,
			last_failure: Mutex::new(None),
		}
	}

	pub fn state(&self) -> PostingState {
		self.state.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<PostingState> {
		self.state.subscribe()
	}

	/// Reason of the most recent failed submission, cleared when the next one starts.
	pub fn last_failure(&self) -> Option<String> {
		self.last_failure
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	fn set_last_failure(&self, reason: Option<String>) {
		*self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = reason;
	}

	fn claim(&self) -> Result<SlotGuard<'_>, PostError> {
		self.in_flight
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.map_err(|_| PostError::AlreadyPending)?;
		Ok(SlotGuard(&self.in_flight))
	}

	/// Post `text` to `recipient` (blank for a public broadcast) and wait for inclusion.
	///
	/// Preconditions are checked in order: slot free, wallet connected, wallet on the target
	/// network, recipient valid, text non-blank. A violation returns before any state change.
	pub async fn submit(&self, text: &str, recipient: &str) -> Result<InclusionReceipt, PostError> {
		let _slot = self.claim()?;

		let from = self.connection.verify_network().await?;
		let recipient = parse_recipient(recipient)?;
		if text.trim().is_empty() {
			return Err(PostError::EmptyMessage);
		}

		self.set_last_failure(None);
		self.state.send_replace(PostingState::Pending);
		info!("Posting message from {} to {}", from, recipient);

		match self.send(&from, &recipient, text).await {
			Ok(receipt) => {
				self.state.send_replace(PostingState::Idle);
				if let Some(sync) = &self.sync {
					sync.request_refresh();
				}
				Ok(receipt)
			}
			Err(e) => {
				let reason = failure_reason(&e);
				error!("Posting failed: {}", reason);
				self.set_last_failure(Some(reason.clone()));
				self.state.send_replace(PostingState::Idle);
				Err(match e {
					LedgerError::Reverted { .. } => PostError::TransactionReverted(reason),
					_ => PostError::Rpc(reason),
				})
			}
		}
	}

	async fn send(
		&self,
		from: &Address,
		recipient: &Address,
		text: &str,
	) -> Result<InclusionReceipt, LedgerError> {
		let pending = self.ledger.submit_message(from, recipient, text).await?;
		self.ledger.wait_for_inclusion(&pending).await
	}
}
