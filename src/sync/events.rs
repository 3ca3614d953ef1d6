//! Events published by the sync engine.
//!
//! Subscribers get these on a broadcast channel. Polling errors are never returned to a caller,
//! so this channel is where they surface.

/// Observable sync outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
	/// The cache was replaced with a fresh fetch.
	CacheReplaced { count: u64, previous: u64 },
	/// A refresh finished after a newer one started or the engine stopped; its result was dropped.
	RefreshDiscarded { generation: u64 },
	/// A poll tick failed; the loop keeps going.
	PollFailed { error: String },
	/// An explicit refresh failed.
	RefreshFailed { error: String },
}
