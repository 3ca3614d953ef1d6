//!
//! Ledger sync engine.
//!
//! The engine keeps `MessageCache` equal to the board. A poll loop asks only for the message
//! count and refetches everything when it moves; `refresh()` does the same on demand.
//!
//! Every refresh takes a ticket from a generation counter when it starts and may only apply its
//! result if the counter still shows that ticket when it finishes. Starting a newer refresh or
//! stopping the engine advances the counter, so stale results are dropped instead of racing.

use crate::ledger::{LedgerClient, LedgerError, Message};
use crate::sync::cache::MessageCache;
use crate::sync::events::SyncEvent;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Result of a refresh that reached the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// Count matched the cache; nothing was fetched.
	Unchanged { count: u64 },
	/// The cache now holds `count` messages.
	Replaced { count: u64 },
	/// The fetch completed but a newer refresh or `stop()` superseded it.
	Discarded,
}

struct Poller {
	handle: JoinHandle<()>,
	shutdown: watch::Sender<bool>,
}

struct Shared {
	client: Arc<dyn LedgerClient>,
	poll_interval: Duration,
	cache: Mutex<MessageCache>,
	generation: AtomicU64,
	messages: watch::Sender<Arc<Vec<Message>>>,
	events: broadcast::Sender<SyncEvent>,
	poller: Mutex<Option<Poller>>,
}

/// Polling sync engine. Clones share the same cache and poll loop.
#[derive(Clone)]
pub struct SyncEngine {
	shared: Arc<Shared>,
}

impl SyncEngine {
	pub fn new(client: Arc<dyn LedgerClient>, poll_interval: Duration) -> Self {
		let (messages, _) = watch::channel(Arc::new(Vec::new()));
		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

		Self {
			shared: Arc::new(Shared {
				client,
				poll_interval,
				cache: Mutex::new(MessageCache::default()),
				generation: AtomicU64::new(0),
				messages,
				events,
				poller: Mutex::new(None),
			}),
		}
	}

	/// Current newest-first messages.
	pub fn messages(&self) -> Arc<Vec<Message>> {
		self.shared.cache().messages()
	}

	/// Ledger count behind the current cache.
	pub fn count(&self) -> u64 {
		self.shared.cache().count()
	}

	pub fn subscribe_messages(&self) -> watch::Receiver<Arc<Vec<Message>>> {
		self.shared.messages.subscribe()
	}

	pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
		self.shared.events.subscribe()
	}

	/// Query the count and refetch the whole board if it differs from the cache.
	///
	/// A failure anywhere leaves the previous cache untouched.
	pub async fn refresh(&self) -> Result<RefreshOutcome, LedgerError> {
		let result = self.shared.refresh().await;
		if let Err(e) = &result {
			warn!("Refresh failed: {}", e);
			self.shared.publish(SyncEvent::RefreshFailed {
				error: e.to_string(),
			});
		}
		result
	}

	/// Run a refresh in the background. Failures are reported on the event channel.
	pub fn request_refresh(&self) -> JoinHandle<()> {
		let engine = self.clone();
		tokio::spawn(async move {
			let _ = engine.refresh().await;
		})
	}

	/// Start the poll loop. The first tick runs immediately.
	///
	/// Returns `false` if the loop is already running.
	pub fn start(&self) -> bool {
		let mut poller = self.shared.poller();
		if poller.as_ref().is_some_and(|p| !p.handle.is_finished()) {
			debug!("Poll loop already running");
			return false;
		}

		let (shutdown, mut shutdown_rx) = watch::channel(false);
		let shared: Weak<Shared> = Arc::downgrade(&self.shared);
		let interval = self.shared.poll_interval;

		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					biased;
					_ = shutdown_rx.changed() => break,
					_ = ticker.tick() => {
						let Some(shared) = shared.upgrade() else {
							break;
						};
						shared.tick().await;
					}
				}
			}
			debug!("Poll loop stopped");
		});

		info!("Polling the message board every {:?}", interval);
		*poller = Some(Poller { handle, shutdown });
		true
	}

	/// Stop the poll loop and discard the result of any refresh still in flight.
	pub fn stop(&self) {
		let poller = self.shared.poller().take();
		self.shared.generation.fetch_add(1, Ordering::SeqCst);
		if let Some(poller) = poller {
			let _ = poller.shutdown.send(true);
			info!("Stopped polling the message board");
		}
	}

	pub fn is_running(&self) -> bool {
		self.shared
			.poller()
			.as_ref()
			.is_some_and(|p| !p.handle.is_finished())
	}
}

impl Shared {
	fn cache(&self) -> MutexGuard<'_, MessageCache> {
		self.cache.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn poller(&self) -> MutexGuard<'_, Option<Poller>> {
		self.poller.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn publish(&self, event: SyncEvent) {
		let _ = self.events.send(event);
	}

	async fn refresh(&self) -> Result<RefreshOutcome, LedgerError> {
		let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let count = self.client.message_count().await?;
		let cached = self.cache().count();
		if count == cached {
			debug!("Message count unchanged at {}", count);
			return Ok(RefreshOutcome::Unchanged { count });
		}
		self.fetch_and_apply(ticket, count).await
	}

	async fn tick(&self) {
		let cached = self.cache().count();
		let count = match self.client.message_count().await {
			Ok(count) => count,
			Err(e) => {
				warn!("Poll failed: {}", e);
				self.publish(SyncEvent::PollFailed {
					error: e.to_string(),
				});
				return;
			}
		};
		if count == cached {
			return;
		}

		let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		if let Err(e) = self.fetch_and_apply(ticket, count).await {
			warn!("Poll refresh failed: {}", e);
			self.publish(SyncEvent::PollFailed {
				error: e.to_string(),
			});
		}
	}

	/// Fetch indices `count-1` down to `0` and replace the cache if `ticket` is still current.
	async fn fetch_and_apply(&self, ticket: u64, count: u64) -> Result<RefreshOutcome, LedgerError> {
		let previous = self.cache().count();
		if count < previous {
			warn!(
				"Message count went down from {} to {}, refetching the board",
				previous, count
			);
		} else {
			info!("Message count changed from {} to {}, refetching", previous, count);
		}

		let mut messages = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
		for index in (0..count).rev() {
			messages.push(self.client.message(index).await?);
		}

		let snapshot = {
			let mut cache = self.cache();
			if self.generation.load(Ordering::SeqCst) != ticket {
				None
			} else {
				let previous = cache.count();
				Some((cache.replace(messages, count), previous))
			}
		};

		match snapshot {
			Some((messages, previous)) => {
				self.messages.send_replace(messages);
				self.publish(SyncEvent::CacheReplaced { count, previous });
				Ok(RefreshOutcome::Replaced { count })
			}
			None => {
				debug!("Discarding refresh {} superseded before it finished", ticket);
				self.publish(SyncEvent::RefreshDiscarded { generation: ticket });
				Ok(RefreshOutcome::Discarded)
			}
		}
	}
}

impl Drop for Shared {
	fn drop(&mut self) {
		let poller = self.poller.get_mut().unwrap_or_else(PoisonError::into_inner);
		if let Some(poller) = poller.take() {
			let _ = poller.shutdown.send(true);
		}
	}
}
