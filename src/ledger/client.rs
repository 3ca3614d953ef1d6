//!
//! Message board ledger client.
//!
//! Provides the `LedgerClient` seam the sync engine and the posting coordinator depend on, and
//! `MessageBoardClient`, its JSON-RPC binding. Reads go to the public RPC endpoint and need no
//! permission; writes go through the wallet bridge, which owns the signing keys, and are then
//! tracked on the public endpoint until a receipt appears.

use crate::ledger::abi;
use crate::ledger::types::*;
use crate::rpc::{ProviderError, RpcClient, RpcError, parse_quantity};

use async_trait::async_trait;
use backoff::{ExponentialBackoff, future::retry};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Read and write access to the message board.
#[async_trait]
pub trait LedgerClient: Send + Sync {
	/// Total number of messages stored. Permissionless.
	async fn message_count(&self) -> Result<u64, LedgerError>;

	/// Message at `index`, where `0 <= index < count`. Permissionless.
	async fn message(&self, index: u64) -> Result<Message, LedgerError>;

	/// Submit a new message signed by `from`.
	async fn submit_message(
		&self,
		from: &Address,
		recipient: &Address,
		text: &str,
	) -> Result<PendingTransaction, LedgerError>;

	/// Wait until `pending` is included, or fail if it reverted or timed out.
	async fn wait_for_inclusion(
		&self,
		pending: &PendingTransaction,
	) -> Result<InclusionReceipt, LedgerError>;
}

/// Subset of a transaction receipt the client inspects.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptData {
	transaction_hash: String,
	block_number: Option<String>,
	status: Option<String>,
}

/// JSON-RPC binding of the message board contract
pub struct MessageBoardClient {
	/// Public endpoint used for reads and receipt tracking.
	reader: RpcClient,
	/// Wallet bridge used to sign and send writes.
	signer: Option<RpcClient>,
	/// Deployed contract address.
	contract: Address,
	/// Upper bound on how long to wait for a receipt.
	inclusion_timeout: Duration,
}

impl MessageBoardClient {
	/// Create a new client.
	///
	/// # Arguments
	/// * `reader` - Client for the public RPC endpoint.
	/// * `signer` - Client for the wallet bridge, or `None` for a read-only client.
	/// * `contract` - Address of the deployed message board.
	/// * `inclusion_timeout` - How long `wait_for_inclusion` keeps polling.
	pub fn new(
		reader: RpcClient,
		signer: Option<RpcClient>,
		contract: Address,
		inclusion_timeout: Duration,
	) -> Self {
		Self {
			reader,
			signer,
			contract,
			inclusion_timeout,
		}
	}

	pub fn contract(&self) -> &Address {
		&self.contract
	}

	async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
		let result: String = self
			.reader
			.request(
				"eth_call",
				json!([{ "to": self.contract.to_hex(), "data": abi::encode_hex(&data) }, "latest"]),
			)
			.await?;
		abi::decode_hex(&result)
	}

	async fn fetch_receipt(&self, hash: &str) -> Result<Option<ReceiptData>, RpcError> {
		self.reader
			.request_optional("eth_getTransactionReceipt", json!([hash]))
			.await
	}

	/// Replay a reverted transaction as a call to recover its `Error(string)` reason.
	async fn replay_revert_reason(
		&self,
		pending: &PendingTransaction,
		block: Option<&str>,
	) -> Option<String> {
		let params = json!([
			{
				"from": pending.from.to_hex(),
				"to": pending.to.to_hex(),
				"data": pending.data,
			},
			block.unwrap_or("latest")
		]);

		match self.reader.request_raw("eth_call", params).await {
			Ok(value) => value
				.as_str()
				.and_then(|hex| abi::decode_hex(hex).ok())
				.and_then(|data| abi::decode_revert_reason(&data)),
			Err(RpcError::Provider(err)) => revert_reason_from_provider(&err),
			Err(e) => {
				debug!("Could not replay reverted transaction {}: {}", pending.hash, e);
				None
			}
		}
	}
}

/// Decode an `Error(string)` reason attached to a provider error.
pub fn revert_reason_from_provider(err: &ProviderError) -> Option<String> {
	let hex = err.revert_data()?;
	let data = abi::decode_hex(hex).ok()?;
	abi::decode_revert_reason(&data)
}

#[async_trait]
impl LedgerClient for MessageBoardClient {
	async fn message_count(&self) -> Result<u64, LedgerError> {
		let data = self.call(abi::encode_get_message_count()).await?;
		abi::decode_u64(&data)
	}

	async fn message(&self, index: u64) -> Result<Message, LedgerError> {
		let data = self.call(abi::encode_messages(index)).await?;
		abi::decode_message(&data)?.into_message()
	}

	async fn submit_message(
		&self,
		from: &Address,
		recipient: &Address,
		text: &str,
	) -> Result<PendingTransaction, LedgerError> {
		let signer = self.signer.as_ref().ok_or_else(|| {
			LedgerError::Rpc(RpcError::Provider(ProviderError {
				code: -32601,
				message: "no wallet bridge configured for signing".to_string(),
				data: None,
			}))
		})?;

		let data = abi::encode_hex(&abi::encode_send_message(recipient, text));
		let hash: String = signer
			.request(
				"eth_sendTransaction",
				json!([{ "from": from.to_hex(), "to": self.contract.to_hex(), "data": data }]),
			)
			.await?;

		info!("Submitted message transaction {}", hash);

		Ok(PendingTransaction {
			hash,
			from: *from,
			to: self.contract,
			data,
		})
	}

	async fn wait_for_inclusion(
		&self,
		pending: &PendingTransaction,
	) -> Result<InclusionReceipt, LedgerError> {
		let policy = ExponentialBackoff {
			initial_interval: Duration::from_millis(500),
			max_interval: Duration::from_secs(5),
			max_elapsed_time: Some(self.inclusion_timeout),
			..ExponentialBackoff::default()
		};

		// `None` from the node means "not yet included", which is the transient case.
		let receipt = retry(policy, || async {
			match self.fetch_receipt(&pending.hash).await {
				Ok(Some(receipt)) => Ok(Some(receipt)),
				Ok(None) => Err(backoff::Error::transient(None)),
				Err(e) => {
					warn!("Receipt lookup for {} failed: {}", pending.hash, e);
					Err(backoff::Error::transient(Some(e)))
				}
			}
		})
		.await;

		let receipt = match receipt {
			Ok(Some(receipt)) => receipt,
			Ok(None) | Err(None) => {
				return Err(LedgerError::InclusionTimeout(pending.hash.clone()));
			}
			Err(Some(e)) => return Err(LedgerError::Rpc(e)),
		};

		let block_number = receipt
			.block_number
			.as_deref()
			.and_then(parse_quantity)
			.unwrap_or_default();

		if receipt.status.as_deref() == Some("0x0") {
			let reason = self
				.replay_revert_reason(pending, receipt.block_number.as_deref())
				.await;
			error!(
				"Transaction {} reverted in block {}: {}",
				receipt.transaction_hash,
				block_number,
				reason.as_deref().unwrap_or("no reason given")
			);
			return Err(LedgerError::Reverted {
				hash: receipt.transaction_hash,
				reason,
			});
		}

		info!(
			"Transaction {} included in block {}",
			receipt.transaction_hash, block_number
		);

		Ok(InclusionReceipt {
			hash: receipt.transaction_hash,
			block_number,
		})
	}
}
