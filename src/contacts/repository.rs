use crate::contacts::types::{Contact, ContactError};

use std::path::PathBuf;
use tracing::debug;

/// Durable storage for the contact list
#[async_trait::async_trait]
pub trait ContactRepository: Send + Sync {
	async fn load(&self) -> Result<Vec<Contact>, ContactError>;
	async fn save(&self, contacts: &[Contact]) -> Result<(), ContactError>;
}

/// Contact list stored as one JSON array in a file
pub struct FileContactRepository {
	path: PathBuf,
}

impl FileContactRepository {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &PathBuf {
		&self.path
	}
}

#[async_trait::async_trait]
impl ContactRepository for FileContactRepository {
	async fn load(&self) -> Result<Vec<Contact>, ContactError> {
		let bytes = match tokio::fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!("No contact file at {}", self.path.display());
				return Ok(Vec::new());
			}
			Err(e) => return Err(e.into()),
		};
		Ok(serde_json::from_slice(&bytes)?)
	}

	async fn save(&self, contacts: &[Contact]) -> Result<(), ContactError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}

		// Atomic replace.
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, serde_json::to_vec_pretty(contacts)?).await?;
		tokio::fs::rename(&tmp, &self.path).await?;

		debug!("Saved {} contacts to {}", contacts.len(), self.path.display());
		Ok(())
	}
}
