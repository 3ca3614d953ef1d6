//! Runtime configuration.
//!
//! Everything is read from `DMAIL_*` environment variables. The target chain defaults to the
//! Monad testnet; the contract address has no default and must be provided.

use crate::ledger::{Address, AddressError};

use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

/// Value left in deployment templates before the contract is deployed.
pub const CONTRACT_PLACEHOLDER: &str = "REPLACE_WITH_YOUR_CONTRACT_ADDRESS";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_INCLUSION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_WALLET_WATCH_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_CONTACTS_PATH: &str = "monad-dmail-contacts.json";

/// Native currency descriptor used in the add-chain request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
	pub name: String,
	pub symbol: String,
	pub decimals: u8,
}

/// The single network the application is allowed to operate on.
///
/// Serializes into the parameter object of `wallet_addEthereumChain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
	#[serde(serialize_with = "serialize_chain_id")]
	pub chain_id: u64,
	pub chain_name: String,
	pub native_currency: NativeCurrency,
	pub rpc_urls: Vec<String>,
	pub block_explorer_urls: Vec<String>,
}

fn serialize_chain_id<S: Serializer>(chain_id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&format!("0x{:X}", chain_id))
}

impl ChainConfig {
	pub fn monad_testnet() -> Self {
		Self {
			chain_id: 10143,
			chain_name: "Monad Testnet".to_string(),
			native_currency: NativeCurrency {
				name: "MON".to_string(),
				symbol: "MON".to_string(),
				decimals: 18,
			},
			rpc_urls: vec!["https://testnet-rpc.monad.xyz/".to_string()],
			block_explorer_urls: vec!["https://testnet.monadexplorer.com/".to_string()],
		}
	}

	/// First RPC URL, used for permissionless reads.
	pub fn rpc_url(&self) -> Option<&str> {
		self.rpc_urls.first().map(String::as_str)
	}
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self::monad_testnet()
	}
}

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Contract address is not configured; set DMAIL_CONTRACT_ADDRESS after deploying")]
	ContractNotConfigured,

	#[error("Invalid contract address: {0}")]
	InvalidContractAddress(#[from] AddressError),

	#[error("Invalid value {value:?} for {key}")]
	InvalidNumber { key: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
	pub chain: ChainConfig,
	/// Endpoint for permissionless reads and receipt tracking.
	pub rpc_url: String,
	/// Wallet bridge endpoint. `None` means no wallet is present.
	pub wallet_url: Option<String>,
	pub contract_address: Address,
	pub poll_interval: Duration,
	pub inclusion_timeout: Duration,
	pub wallet_watch_interval: Duration,
	pub contacts_path: PathBuf,
}

impl AppConfig {
	/// Load configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Load configuration from an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

		let chain = ChainConfig::default();

		let contract = get("DMAIL_CONTRACT_ADDRESS")
			.filter(|value| value != CONTRACT_PLACEHOLDER)
			.ok_or(ConfigError::ContractNotConfigured)?;
		let contract_address: Address = contract.parse()?;

		let rpc_url = get("DMAIL_RPC_URL")
			.or_else(|| chain.rpc_url().map(str::to_string))
			.unwrap_or_default();

		let seconds = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
			match get(key) {
				None => Ok(default),
				Some(value) => match value.parse::<u64>() {
					Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
					_ => Err(ConfigError::InvalidNumber { key, value }),
				},
			}
		};

		Ok(Self {
			rpc_url,
			wallet_url: get("DMAIL_WALLET_URL"),
			contract_address,
			poll_interval: seconds("DMAIL_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?,
			inclusion_timeout: seconds("DMAIL_INCLUSION_TIMEOUT_SECS", DEFAULT_INCLUSION_TIMEOUT)?,
			wallet_watch_interval: seconds("DMAIL_WALLET_WATCH_SECS", DEFAULT_WALLET_WATCH_INTERVAL)?,
			contacts_path: get("DMAIL_CONTACTS_PATH")
				.map(PathBuf::from)
				.unwrap_or_else(|| PathBuf::from(DEFAULT_CONTACTS_PATH)),
			chain,
		})
	}
}
