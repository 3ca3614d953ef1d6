//! Minimal ABI encoding for the message board contract.
//!
//! Only the shapes the contract uses are supported: `uint256`, `address` and a single dynamic
//! `string`. Values are laid out in 32-byte words; dynamic values live in the tail and are
//! referenced by a byte offset in the head.

use crate::ledger::types::{Address, LedgerError, RawMessage};

use sha3::{Digest, Keccak256};

const WORD: usize = 32;

/// Selector of the standard `Error(string)` revert payload.
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

pub const GET_MESSAGE_COUNT: &str = "getMessageCount()";
pub const MESSAGES: &str = "messages(uint256)";
pub const SEND_MESSAGE: &str = "sendMessage(address,string)";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
	let digest = Keccak256::digest(data);
	let mut out = [0u8; 32];
	out.copy_from_slice(&digest);
	out
}

/// First four bytes of the keccak hash of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
	let hash = keccak256(signature.as_bytes());
	[hash[0], hash[1], hash[2], hash[3]]
}

fn uint_word(value: u64) -> [u8; WORD] {
	let mut word = [0u8; WORD];
	word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
	word
}

fn address_word(address: &Address) -> [u8; WORD] {
	let mut word = [0u8; WORD];
	word[WORD - 20..].copy_from_slice(address.as_bytes());
	word
}

/// Calldata for `getMessageCount()`.
pub fn encode_get_message_count() -> Vec<u8> {
	selector(GET_MESSAGE_COUNT).to_vec()
}

/// Calldata for the `messages(uint256)` getter.
pub fn encode_messages(index: u64) -> Vec<u8> {
	let mut data = selector(MESSAGES).to_vec();
	data.extend_from_slice(&uint_word(index));
	data
}

/// Calldata for `sendMessage(address,string)`.
pub fn encode_send_message(recipient: &Address, text: &str) -> Vec<u8> {
	let bytes = text.as_bytes();
	let padded_len = bytes.len().div_ceil(WORD) * WORD;

	let mut data = selector(SEND_MESSAGE).to_vec();
	data.extend_from_slice(&address_word(recipient));
	// Two head words precede the string tail.
	data.extend_from_slice(&uint_word((2 * WORD) as u64));
	data.extend_from_slice(&uint_word(bytes.len() as u64));
	data.extend_from_slice(bytes);
	data.resize(data.len() + (padded_len - bytes.len()), 0);
	data
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], LedgerError> {
	let start = index * WORD;
	data.get(start..start + WORD).ok_or_else(|| {
		LedgerError::Decode(format!(
			"return data too short: need word {} of {} bytes",
			index,
			data.len()
		))
	})
}

fn word_to_u64(word: &[u8]) -> Result<u64, LedgerError> {
	if word[..WORD - 8].iter().any(|b| *b != 0) {
		return Err(LedgerError::Decode("uint256 value exceeds u64".to_string()));
	}
	let mut bytes = [0u8; 8];
	bytes.copy_from_slice(&word[WORD - 8..]);
	Ok(u64::from_be_bytes(bytes))
}

fn word_to_address(word: &[u8]) -> Result<Address, LedgerError> {
	if word[..WORD - 20].iter().any(|b| *b != 0) {
		return Err(LedgerError::Decode("address word has dirty high bytes".to_string()));
	}
	let mut bytes = [0u8; 20];
	bytes.copy_from_slice(&word[WORD - 20..]);
	Ok(Address::new(bytes))
}

fn string_at(data: &[u8], offset: usize) -> Result<String, LedgerError> {
	let start = offset.checked_add(WORD);
	let len_word = start
		.and_then(|start| data.get(offset..start))
		.ok_or_else(|| LedgerError::Decode(format!("string offset {} out of bounds", offset)))?;
	let len = word_to_u64(len_word)? as usize;
	let bytes = start
		.and_then(|start| data.get(start..start.checked_add(len)?))
		.ok_or_else(|| LedgerError::Decode(format!("string of length {} out of bounds", len)))?;

	String::from_utf8(bytes.to_vec())
		.map_err(|e| LedgerError::Decode(format!("string is not valid UTF-8: {}", e)))
}

/// Decode a single `uint256` return value.
pub fn decode_u64(data: &[u8]) -> Result<u64, LedgerError> {
	word_to_u64(word_at(data, 0)?)
}

/// Decode the `(address author, address recipient, string text, uint256 timestamp)`
/// tuple returned by the `messages(uint256)` getter.
pub fn decode_message(data: &[u8]) -> Result<RawMessage, LedgerError> {
	let author = word_to_address(word_at(data, 0)?)?;
	let recipient = word_to_address(word_at(data, 1)?)?;
	let text_offset = word_to_u64(word_at(data, 2)?)? as usize;
	let timestamp_seconds = word_to_u64(word_at(data, 3)?)?;
	let text = string_at(data, text_offset)?;

	Ok(RawMessage {
		author,
		recipient,
		text,
		timestamp_seconds,
	})
}

/// Extract the message from `Error(string)` revert data, if that is what it is.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
	let payload = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
	let offset = word_to_u64(word_at(payload, 0).ok()?).ok()? as usize;
	string_at(payload, offset).ok().filter(|reason| !reason.is_empty())
}

/// Decode `0x`-prefixed hex return data.
pub fn decode_hex(data: &str) -> Result<Vec<u8>, LedgerError> {
	let digits = data.strip_prefix("0x").unwrap_or(data);
	hex::decode(digits).map_err(|e| LedgerError::Decode(format!("invalid hex return data: {}", e)))
}

/// Encode calldata as `0x`-prefixed hex.
pub fn encode_hex(data: &[u8]) -> String {
	format!("0x{}", hex::encode(data))
}
