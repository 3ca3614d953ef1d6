//!
//! In-memory contact list backed by a `ContactRepository`.
//!
//! The list never holds two contacts with the same address (ignoring case) and is kept sorted by
//! name. Every mutation is written through before returning; a failed write is logged and the
//! in-memory change stands.

use crate::contacts::repository::ContactRepository;
use crate::contacts::types::{Contact, ContactError};

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Name order: case-insensitive, ties broken by the exact name.
fn by_name(a: &Contact, b: &Contact) -> Ordering {
	a.name
		.to_lowercase()
		.cmp(&b.name.to_lowercase())
		.then_with(|| a.name.cmp(&b.name))
}

pub struct ContactStore {
	contacts: Vec<Contact>,
	repository: Arc<dyn ContactRepository>,
}

impl ContactStore {
	/// Load the stored list. A load failure is logged and yields an empty store.
	pub async fn load(repository: Arc<dyn ContactRepository>) -> Self {
		let stored = match repository.load().await {
			Ok(contacts) => contacts,
			Err(e) => {
				error!("Failed to load contacts: {}", e);
				Vec::new()
			}
		};

		let mut contacts: Vec<Contact> = Vec::with_capacity(stored.len());
		for contact in stored {
			if contact.name.trim().is_empty() {
				warn!("Skipping stored contact without a name ({})", contact.address);
				continue;
			}
			if contacts.iter().any(|c| c.has_address(&contact.address)) {
				warn!("Skipping duplicate stored contact {}", contact.address);
				continue;
			}
			contacts.push(contact);
		}
		contacts.sort_by(by_name);

		info!("Loaded {} contacts", contacts.len());
		Self {
			contacts,
			repository,
		}
	}

	pub fn contacts(&self) -> &[Contact] {
		&self.contacts
	}

	pub fn lookup(&self, address: &str) -> Option<&Contact> {
		let address = address.trim();
		self.contacts.iter().find(|c| c.has_address(address))
	}

	/// Add a contact. Fails with `Duplicate` if the address is already known.
	pub async fn add(&mut self, contact: Contact) -> Result<(), ContactError> {
		let contact = Contact::new(contact.name.trim(), contact.address.trim());
		if contact.name.is_empty() {
			return Err(ContactError::EmptyName);
		}
		if self.lookup(&contact.address).is_some() {
			warn!("Contact with address {} already exists", contact.address);
			return Err(ContactError::Duplicate(contact.address));
		}

		self.contacts.push(contact);
		self.contacts.sort_by(by_name);
		self.persist().await;
		Ok(())
	}

	/// Remove the contact with `address`, if any. The list is written either way.
	pub async fn remove(&mut self, address: &str) {
		let address = address.trim();
		self.contacts.retain(|c| !c.has_address(address));
		self.persist().await;
	}

	async fn persist(&self) {
		if let Err(e) = self.repository.save(&self.contacts).await {
			error!("Failed to save contacts: {}", e);
		}
	}
}
