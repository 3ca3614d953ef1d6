use crate::ledger::Address;

/// Label shown for the account the wallet is connected with.
pub const SELF_LABEL: &str = "You";

/// Label shown for the public broadcast recipient.
pub const PUBLIC_LABEL: &str = "Public";

/// `0x1234...abcd`: first six and last four characters of the checksummed form.
pub fn short_address(address: &Address) -> String {
	let full = address.to_checksum();
	format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Name shown for `address`: the connected account, a known contact, or the short address.
pub fn display_name(address: &Address, contact_name: Option<&str>, current_account: Option<&Address>) -> String {
	if current_account == Some(address) {
		return SELF_LABEL.to_string();
	}
	match contact_name {
		Some(name) => name.to_string(),
		None => short_address(address),
	}
}

/// Like `display_name`, but the zero address reads as the public board.
pub fn recipient_label(
	recipient: &Address,
	contact_name: Option<&str>,
	current_account: Option<&Address>,
) -> String {
	if recipient.is_zero() {
		return PUBLIC_LABEL.to_string();
	}
	display_name(recipient, contact_name, current_account)
}
