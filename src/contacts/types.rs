use serde::{Deserialize, Serialize};

/// A named address. `address` is kept as entered; comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
	pub name: String,
	pub address: String,
}

impl Contact {
	pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			address: address.into(),
		}
	}

	pub fn has_address(&self, address: &str) -> bool {
		self.address.eq_ignore_ascii_case(address)
	}
}

/// Error types for the contact store
#[derive(Debug, thiserror::Error)]
pub enum ContactError {
	#[error("Contact name must not be empty")]
	EmptyName,

	#[error("Contact with address {0} already exists")]
	Duplicate(String),

	#[error("Contact persistence error: {0}")]
	Persistence(String),
}

impl From<std::io::Error> for ContactError {
	fn from(e: std::io::Error) -> Self {
		ContactError::Persistence(e.to_string())
	}
}

impl From<serde_json::Error> for ContactError {
	fn from(e: serde_json::Error) -> Self {
		ContactError::Persistence(e.to_string())
	}
}
