//! Types for the message board ledger: addresses, messages, transactions and errors

use crate::ledger::abi::keccak256;
use crate::rpc::RpcError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// A 20-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

/// Sentinel recipient meaning "public broadcast".
pub const ZERO_ADDRESS: Address = Address([0u8; 20]);

impl Address {
	pub const fn new(bytes: [u8; 20]) -> Self {
		Self(bytes)
	}

	pub fn as_bytes(&self) -> &[u8; 20] {
		&self.0
	}

	pub fn is_zero(&self) -> bool {
		*self == ZERO_ADDRESS
	}

	/// Lowercase `0x`-prefixed hex, the form sent over JSON-RPC.
	pub fn to_hex(&self) -> String {
		format!("0x{}", hex::encode(self.0))
	}

	/// EIP-55 mixed-case checksum encoding.
	pub fn to_checksum(&self) -> String {
		let lower = hex::encode(self.0);
		let hash = keccak256(lower.as_bytes());

		let mut out = String::with_capacity(42);
		out.push_str("0x");
		for (i, c) in lower.chars().enumerate() {
			let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
			if c.is_ascii_alphabetic() && nibble >= 8 {
				out.push(c.to_ascii_uppercase());
			} else {
				out.push(c);
			}
		}
		out
	}
}

/// Reasons an address string is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
	#[error("address must start with 0x")]
	MissingPrefix,

	#[error("address must be 40 hex characters, got {0}")]
	InvalidLength(usize),

	#[error("address contains non-hex characters")]
	InvalidHex,

	#[error("address checksum mismatch")]
	BadChecksum,
}

impl FromStr for Address {
	type Err = AddressError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let digits = s
			.strip_prefix("0x")
			.or_else(|| s.strip_prefix("0X"))
			.ok_or(AddressError::MissingPrefix)?;

		if digits.len() != 40 {
			return Err(AddressError::InvalidLength(digits.len()));
		}

		let mut bytes = [0u8; 20];
		hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::InvalidHex)?;
		let address = Address(bytes);

		// Single-case input carries no checksum.
		let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
		let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
		if has_lower && has_upper && address.to_checksum()[2..] != *digits {
			return Err(AddressError::BadChecksum);
		}

		Ok(address)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_checksum())
	}
}

impl fmt::Debug for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Address({})", self.to_checksum())
	}
}

impl<'de> Deserialize<'de> for Address {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Message as stored by the contract, before timestamp conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
	pub author: Address,
	pub recipient: Address,
	pub text: String,
	pub timestamp_seconds: u64,
}

impl RawMessage {
	/// Convert into the immutable read-model value.
	pub fn into_message(self) -> Result<Message, LedgerError> {
		let seconds = i64::try_from(self.timestamp_seconds)
			.map_err(|_| LedgerError::Decode(format!("timestamp {} out of range", self.timestamp_seconds)))?;
		let timestamp = DateTime::<Utc>::from_timestamp(seconds, 0)
			.ok_or_else(|| LedgerError::Decode(format!("timestamp {} out of range", seconds)))?;

		Ok(Message {
			author: self.author,
			recipient: self.recipient,
			text: self.text,
			timestamp,
		})
	}
}

/// A message recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
	pub author: Address,
	pub recipient: Address,
	pub text: String,
	pub timestamp: DateTime<Utc>,
}

impl Message {
	/// Whether the message is addressed to nobody in particular.
	pub fn is_public_broadcast(&self) -> bool {
		self.recipient.is_zero()
	}

	pub fn is_from(&self, account: &Address) -> bool {
		self.author == *account
	}

	pub fn is_to(&self, account: &Address) -> bool {
		self.recipient == *account
	}
}

/// A submitted write that has not been confirmed yet.
///
/// The call fields are kept so a reverted transaction can be replayed to
/// recover its revert reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
	pub hash: String,
	pub from: Address,
	pub to: Address,
	pub data: String,
}

/// Confirmation that a write was included by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionReceipt {
	pub hash: String,
	pub block_number: u64,
}

/// Error types for ledger reads and writes
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
	#[error("RPC error: {0}")]
	Rpc(#[from] RpcError),

	#[error("ABI decode error: {0}")]
	Decode(String),

	#[error("Transaction {hash} reverted")]
	Reverted {
		hash: String,
		reason: Option<String>,
	},

	#[error("Transaction {0} was not included before the timeout")]
	InclusionTimeout(String),
}
