//! Local address book.

mod repository;
mod store;
mod types;

pub use repository::{ContactRepository, FileContactRepository};
pub use store::ContactStore;
pub use types::*;
