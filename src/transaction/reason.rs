//! Human-readable reasons for failed submissions.

use crate::ledger::{LedgerError, revert_reason_from_provider};
use crate::rpc::RpcError;

/// Shown when a failure carries nothing more specific.
pub const GENERIC_FAILURE_REASON: &str = "There was an error with your transaction.";

/// Pick the most specific reason available for a failed submission.
///
/// In order: the contract's revert reason, the provider's nested `data.message`, the provider's
/// own message, the rendered error, and finally `GENERIC_FAILURE_REASON`.
pub fn failure_reason(err: &LedgerError) -> String {
	let provider = match err {
		LedgerError::Rpc(RpcError::Provider(provider)) => Some(provider),
		_ => None,
	};

	let revert_reason = match err {
		LedgerError::Reverted { reason, .. } => reason.clone(),
		_ => provider.and_then(revert_reason_from_provider),
	};

	first_reason([
		revert_reason,
		provider.and_then(|p| p.data_message()).map(str::to_string),
		provider.map(|p| p.message.clone()),
		Some(err.to_string()),
	])
}

fn first_reason<I>(candidates: I) -> String
where
	I: IntoIterator<Item = Option<String>>,
{
	candidates
		.into_iter()
		.flatten()
		.map(|reason| reason.trim().to_string())
		.find(|reason| !reason.is_empty())
		.unwrap_or_else(|| GENERIC_FAILURE_REASON.to_string())
}
