//! Message board synchronization: a newest-first read cache kept current by polling the ledger.

mod cache;
mod engine;
pub mod events;

pub use cache::MessageCache;
pub use engine::{RefreshOutcome, SyncEngine};
pub use events::SyncEvent;
