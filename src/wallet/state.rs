//! Wallet connection state machine.
//!
//! The machine is a pure reducer: `transition(&snapshot, event) -> snapshot`. The manager feeds it
//! both the outcomes of its own connect flow and the events the wallet fires on its own, so every
//! interleaving can be replayed in a unit test without a wallet.
//!
//! Each connect flow is tagged with an `attempt` number. External events that invalidate what a
//! flow assumed (account revoked, chain changed before the flow finished or under a live session)
//! bump the number, and outcomes carrying an older number are ignored.

use crate::ledger::Address;
use crate::wallet::types::WalletEvent;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
	#[default]
	Disconnected,
	Connecting,
	Connected,
	NetworkMismatchRetrying,
	Failed,
}

/// Everything observers need to know about the connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
	pub state: ConnectionState,
	/// Active account. Always present while `Connected`.
	pub account: Option<Address>,
	/// Reason for the last failure, while `Failed`.
	pub failure: Option<String>,
	/// Tag of the current connect flow.
	pub attempt: u64,
	/// The wallet changed network under a live session; the owner must rebuild.
	pub reload_required: bool,
}

impl ConnectionSnapshot {
	pub fn is_connected(&self) -> bool {
		self.state == ConnectionState::Connected && self.account.is_some()
	}
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
	/// User asked to connect.
	ConnectRequested,
	/// Wallet granted accounts; `on_target_network` is the chain comparison result.
	AccountsGranted {
		attempt: u64,
		account: Address,
		on_target_network: bool,
	},
	/// Switch or add-then-switch was accepted.
	NetworkSwitched { attempt: u64 },
	/// The flow failed (no wallet, rejection, switch refused, RPC error).
	AttemptFailed { attempt: u64, reason: String },
	/// A previously authorized account on the right network was found at startup.
	SessionRestored { account: Address },
	/// Event fired by the wallet.
	Wallet(WalletEvent),
}

/// Compute the next snapshot. Events that do not apply in the current state
/// return an unchanged copy.
pub fn transition(current: &ConnectionSnapshot, event: ConnectionEvent) -> ConnectionSnapshot {
	use ConnectionState::*;

	let mut next = current.clone();

	match event {
		ConnectionEvent::ConnectRequested => {
			if matches!(current.state, Disconnected | Failed) {
				next.state = Connecting;
				next.attempt += 1;
				next.failure = None;
				next.reload_required = false;
			}
		}
		ConnectionEvent::AccountsGranted {
			attempt,
			account,
			on_target_network,
		} => {
			if attempt == current.attempt && current.state == Connecting {
				next.account = Some(account);
				next.state = if on_target_network {
					Connected
				} else {
					NetworkMismatchRetrying
				};
			}
		}
		ConnectionEvent::NetworkSwitched { attempt } => {
			if attempt == current.attempt && current.state == NetworkMismatchRetrying {
				next.state = Connected;
			}
		}
		ConnectionEvent::AttemptFailed { attempt, reason } => {
			if attempt == current.attempt
				&& matches!(current.state, Connecting | NetworkMismatchRetrying)
			{
				next.state = Failed;
				next.account = None;
				next.failure = Some(reason);
			}
		}
		ConnectionEvent::SessionRestored { account } => {
			if current.state == Disconnected {
				next.state = Connected;
				next.account = Some(account);
			}
		}
		ConnectionEvent::Wallet(WalletEvent::AccountsChanged(accounts)) => match accounts.first() {
			None => {
				next.state = Disconnected;
				next.account = None;
				next.failure = None;
				next.attempt += 1;
			}
			Some(first) => {
				if current.account.is_some_and(|active| active != *first) {
					next.account = Some(*first);
				}
			}
		},
		ConnectionEvent::Wallet(WalletEvent::ChainChanged(_)) => match current.state {
			Connected => {
				next.state = Disconnected;
				next.account = None;
				next.attempt += 1;
				next.reload_required = true;
			}
			// The flow compared against a chain id that is no longer current.
			Connecting => {
				next.state = Disconnected;
				next.account = None;
				next.attempt += 1;
			}
			// A switch we asked for lands here too while retrying.
			Disconnected | NetworkMismatchRetrying | Failed => {}
		},
	}

	next
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(byte: u8) -> Address {
		Address::new([byte; 20])
	}

	fn run(events: Vec<ConnectionEvent>) -> ConnectionSnapshot {
		events
			.into_iter()
			.fold(ConnectionSnapshot::default(), |state, event| transition(&state, event))
	}

	#[test]
	fn connect_on_correct_network() {
		let state = run(vec![
			ConnectionEvent::ConnectRequested,
			ConnectionEvent::AccountsGranted {
				attempt: 1,
				account: addr(1),
				on_target_network: true,
			},
		]);
		assert_eq!(state.state, ConnectionState::Connected);
		assert_eq!(state.account, Some(addr(1)));
	}

	#[test]
	fn mismatch_then_switch_connects() {
		let mismatched = run(vec![
			ConnectionEvent::ConnectRequested,
			ConnectionEvent::AccountsGranted {
				attempt: 1,
				account: addr(1),
				on_target_network: false,
			},
		]);
		assert_eq!(mismatched.state, ConnectionState::NetworkMismatchRetrying);

		let switched = transition(&mismatched, ConnectionEvent::NetworkSwitched { attempt: 1 });
		assert!(switched.is_connected());

		let refused = transition(
			&mismatched,
			ConnectionEvent::AttemptFailed {
				attempt: 1,
				reason: "rejected".to_string(),
			},
		);
		assert_eq!(refused.state, ConnectionState::Failed);
		assert_eq!(refused.account, None);
		assert_eq!(refused.failure.as_deref(), Some("rejected"));
	}

	#[test]
	fn connect_requested_is_ignored_while_busy() {
		let connecting = run(vec![ConnectionEvent::ConnectRequested]);
		let again = transition(&connecting, ConnectionEvent::ConnectRequested);
		assert_eq!(again, connecting);
		assert_eq!(again.attempt, 1);
	}

	#[test]
	fn retry_after_failure_starts_new_attempt() {
		let failed = run(vec![
			ConnectionEvent::ConnectRequested,
			ConnectionEvent::AttemptFailed {
				attempt: 1,
				reason: "No wallet provider found".to_string(),
			},
		]);
		let retry = transition(&failed, ConnectionEvent::ConnectRequested);
		assert_eq!(retry.state, ConnectionState::Connecting);
		assert_eq!(retry.attempt, 2);
		assert_eq!(retry.failure, None);
	}

	#[test]
	fn empty_accounts_disconnects_from_any_state() {
		for state in [
			ConnectionState::Connecting,
			ConnectionState::Connected,
			ConnectionState::NetworkMismatchRetrying,
			ConnectionState::Failed,
		] {
			let current = ConnectionSnapshot {
				state,
				account: Some(addr(1)),
				attempt: 3,
				..Default::default()
			};
			let next = transition(
				&current,
				ConnectionEvent::Wallet(WalletEvent::AccountsChanged(vec![])),
			);
			assert_eq!(next.state, ConnectionState::Disconnected);
			assert_eq!(next.account, None);
			assert_eq!(next.attempt, 4);
		}
	}

	#[test]
	fn stale_outcome_after_revocation_is_ignored() {
		let state = run(vec![
			ConnectionEvent::ConnectRequested,
			ConnectionEvent::Wallet(WalletEvent::AccountsChanged(vec![])),
			ConnectionEvent::AccountsGranted {
				attempt: 1,
				account: addr(1),
				on_target_network: true,
			},
		]);
		assert_eq!(state.state, ConnectionState::Disconnected);
		assert_eq!(state.account, None);
	}

	#[test]
	fn account_swap_keeps_connected() {
		let connected = run(vec![ConnectionEvent::SessionRestored { account: addr(1) }]);
		let swapped = transition(
			&connected,
			ConnectionEvent::Wallet(WalletEvent::AccountsChanged(vec![addr(2), addr(1)])),
		);
		assert_eq!(swapped.state, ConnectionState::Connected);
		assert_eq!(swapped.account, Some(addr(2)));
		assert_eq!(swapped.attempt, connected.attempt);

		let same = transition(
			&swapped,
			ConnectionEvent::Wallet(WalletEvent::AccountsChanged(vec![addr(2)])),
		);
		assert_eq!(same, swapped);
	}

	#[test]
	fn chain_change_while_connected_requires_reload() {
		let connected = run(vec![ConnectionEvent::SessionRestored { account: addr(1) }]);
		let next = transition(&connected, ConnectionEvent::Wallet(WalletEvent::ChainChanged(1)));
		assert_eq!(next.state, ConnectionState::Disconnected);
		assert_eq!(next.account, None);
		assert!(next.reload_required);
	}

	#[test]
	fn chain_change_while_connecting_supersedes_attempt() {
		let state = run(vec![
			ConnectionEvent::ConnectRequested,
			ConnectionEvent::Wallet(WalletEvent::ChainChanged(1)),
			ConnectionEvent::AccountsGranted {
				attempt: 1,
				account: addr(1),
				on_target_network: true,
			},
		]);
		assert_ne!(state.state, ConnectionState::Connected);
		assert_eq!(state.state, ConnectionState::Disconnected);
		assert_eq!(state.account, None);
		assert_eq!(state.attempt, 2);
		assert!(!state.reload_required);

		let retry = transition(&state, ConnectionEvent::ConnectRequested);
		assert_eq!(retry.state, ConnectionState::Connecting);
		assert_eq!(retry.attempt, 3);
	}

	#[test]
	fn chain_change_during_switch_is_not_a_reset() {
		let mismatched = run(vec![
			ConnectionEvent::ConnectRequested,
			ConnectionEvent::AccountsGranted {
				attempt: 1,
				account: addr(1),
				on_target_network: false,
			},
		]);
		let next = transition(
			&mismatched,
			ConnectionEvent::Wallet(WalletEvent::ChainChanged(10143)),
		);
		assert_eq!(next, mismatched);
	}

	#[test]
	fn restore_only_applies_when_disconnected() {
		let connecting = run(vec![ConnectionEvent::ConnectRequested]);
		let next = transition(&connecting, ConnectionEvent::SessionRestored { account: addr(1) });
		assert_eq!(next, connecting);
	}
}
