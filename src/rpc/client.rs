//!
//! JSON-RPC 2.0 client over HTTP.
//!
//! This module provides the async transport shared by the ledger reader and the wallet bridge.
//! Every call is a single POST. The HTTP client enforces the request timeout; a stalled node
//! surfaces as an ordinary `RpcError::Http`.

use super::types::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout applied by the HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC client bound to one endpoint
#[derive(Clone)]
pub struct RpcClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// The endpoint URL.
	url: String,
	/// Request id counter, shared between clones.
	next_id: Arc<AtomicU64>,
}

impl RpcClient {
	/// Create a new client for `url` with the default request timeout.
	pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
		Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
	}

	/// Create a new client for `url` with an explicit request timeout.
	pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			url: url.into(),
			next_id: Arc::new(AtomicU64::new(1)),
		})
	}

	/// The endpoint this client talks to.
	pub fn url(&self) -> &str {
		&self.url
	}

	/// Execute a request and return the raw `result` value.
	///
	/// A missing `result` is returned as `Value::Null`, leaving it to the
	/// caller to decide whether that is legal for the method.
	pub async fn request_raw(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, RpcError> {
		let request = RpcRequest {
			jsonrpc: "2.0",
			id: self.next_id.fetch_add(1, Ordering::Relaxed),
			method,
			params,
		};

		debug!("JSON-RPC {} -> {} (id {})", method, self.url, request.id);

		let response = self
			.http_client
			.post(&self.url)
			.header("Content-Type", "application/json")
			.json(&request)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(RpcError::Status(response.status().as_u16()));
		}

		let body: RpcResponse = response.json().await?;

		if let Some(error) = body.error {
			debug!("JSON-RPC {} failed: {}", method, error);
			return Err(RpcError::Provider(error));
		}

		Ok(body.result.unwrap_or(serde_json::Value::Null))
	}

	/// Execute a request whose result must be present.
	pub async fn request<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<T, RpcError> {
		match self.request_raw(method, params).await? {
			serde_json::Value::Null => Err(RpcError::NoResult),
			value => Ok(serde_json::from_value(value)?),
		}
	}

	/// Execute a request whose result may legitimately be `null`.
	pub async fn request_optional<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<Option<T>, RpcError> {
		match self.request_raw(method, params).await? {
			serde_json::Value::Null => Ok(None),
			value => Ok(Some(serde_json::from_value(value)?)),
		}
	}

	/// Query the chain id of the endpoint (`eth_chainId`).
	pub async fn chain_id(&self) -> Result<u64, RpcError> {
		let hex: String = self.request("eth_chainId", json!([])).await?;
		parse_quantity(&hex).ok_or_else(|| {
			RpcError::Provider(ProviderError {
				code: -32602,
				message: format!("invalid chain id quantity: {}", hex),
				data: None,
			})
		})
	}
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(hex: &str) -> Option<u64> {
	let digits = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X"))?;
	if digits.is_empty() {
		return None;
	}
	u64::from_str_radix(digits, 16).ok()
}

/// Format a quantity as minimal `0x`-prefixed hex.
pub fn format_quantity(value: u64) -> String {
	format!("0x{:x}", value)
}
