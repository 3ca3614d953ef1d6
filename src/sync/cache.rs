use crate::ledger::Message;

use std::sync::Arc;

/// Newest-first copy of the board plus the count it was built from.
///
/// The list is only ever swapped as a whole, so readers holding the `Arc`
/// keep a consistent view while a refresh replaces it.
#[derive(Debug, Clone, Default)]
pub struct MessageCache {
	messages: Arc<Vec<Message>>,
	count: u64,
}

impl MessageCache {
	pub fn messages(&self) -> Arc<Vec<Message>> {
		self.messages.clone()
	}

	/// Ledger count at the last successful refresh.
	pub fn count(&self) -> u64 {
		self.count
	}

	pub fn len(&self) -> usize {
		self.messages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}

	/// Swap in a complete newest-first list fetched at `count`.
	pub(crate) fn replace(&mut self, messages: Vec<Message>, count: u64) -> Arc<Vec<Message>> {
		self.messages = Arc::new(messages);
		self.count = count;
		self.messages.clone()
	}
}
