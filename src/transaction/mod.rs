/// Posting coordinator for new messages
mod poster;
/// Failure reason extraction for rejected or reverted submissions
pub mod reason;

pub use poster::{PostError, Poster, PostingState};
pub use reason::{GENERIC_FAILURE_REASON, failure_reason};
