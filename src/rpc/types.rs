//! Types for JSON-RPC 2.0 requests, responses and errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider error code for a request the user declined in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Provider error code for a chain the wallet does not know about.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Outgoing JSON-RPC request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
	pub jsonrpc: &'static str,
	pub id: u64,
	pub method: &'a str,
	pub params: serde_json::Value,
}

/// Incoming JSON-RPC response envelope.
///
/// A well-formed response carries exactly one of `result` or `error`; a
/// `null` result is legal for some methods (for example a receipt that does
/// not exist yet), which is why `result` stays a raw value here.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
	#[serde(default)]
	pub id: Option<serde_json::Value>,
	#[serde(default)]
	pub result: Option<serde_json::Value>,
	#[serde(default)]
	pub error: Option<ProviderError>,
}

/// Structured error object returned by a node or wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderError {
	/// Numeric error code (EIP-1193 codes for wallets, node-specific otherwise).
	pub code: i64,
	/// Human readable message chosen by the provider.
	#[serde(default)]
	pub message: String,
	/// Optional extra payload. Nodes put revert data here as a hex string,
	/// some wallets nest a further `{ message }` object.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<serde_json::Value>,
}

impl ProviderError {
	/// Whether the user declined the request in the wallet.
	pub fn is_user_rejection(&self) -> bool {
		self.code == USER_REJECTED_CODE
	}

	/// Whether the wallet does not know the requested chain.
	pub fn is_unrecognized_chain(&self) -> bool {
		self.code == UNRECOGNIZED_CHAIN_CODE
	}

	/// Message nested inside `data`, if the provider supplied one.
	pub fn data_message(&self) -> Option<&str> {
		self.data
			.as_ref()
			.and_then(|data| data.get("message"))
			.and_then(|message| message.as_str())
			.filter(|message| !message.is_empty())
	}

	/// Hex return data attached to the error, if any.
	///
	/// Accepts either a bare hex string or an object with a `data` field.
	pub fn revert_data(&self) -> Option<&str> {
		let data = self.data.as_ref()?;
		data.as_str()
			.or_else(|| data.get("data").and_then(|inner| inner.as_str()))
			.filter(|hex| hex.starts_with("0x"))
	}
}

impl fmt::Display for ProviderError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "provider error {}: {}", self.code, self.message)
	}
}

/// Error types for JSON-RPC transport and provider failures
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("HTTP status {0}")]
	Status(u16),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("{0}")]
	Provider(ProviderError),

	#[error("No result returned")]
	NoResult,
}

impl RpcError {
	/// The structured provider error, when the failure came from the remote side.
	pub fn provider(&self) -> Option<&ProviderError> {
		match self {
			RpcError::Provider(err) => Some(err),
			_ => None,
		}
	}

	/// Whether the user declined the request.
	pub fn is_user_rejection(&self) -> bool {
		self.provider().is_some_and(ProviderError::is_user_rejection)
	}
}
