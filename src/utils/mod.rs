//!
//! Utility module for message board display.
//!
//! Re-exports formatting helpers used by the session and the binary.
/// Address and name formatting for display
pub mod format;

pub use format::{display_name, recipient_label, short_address};
