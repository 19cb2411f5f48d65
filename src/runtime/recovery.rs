//! Failure recovery policy
//!
//! Decides what a failed message exchange turns into. Automatic recovery is
//! allowed at most once per turn: every recovered attempt is issued with
//! `auto_retry = false`.

use crate::transport::TransportError;
use std::time::Duration;

const SESSION_NOT_FOUND: u16 = 404;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Server forgot the session; create a new one and re-issue the text
    RecreateSession,
    /// Transient failure; wait and re-issue the text
    RetryAfter(Duration),
    /// Terminal for the turn; log the message and fail the placeholder
    Surface { message: String },
    /// Superseded or cancelled by the user; leave no trace
    Abandon,
}

pub fn decide(error: &TransportError, auto_retry: bool, backoff: Duration) -> RecoveryDecision {
    if error.is_cancelled() {
        return RecoveryDecision::Abandon;
    }

    if auto_retry {
        if error.status() == Some(SESSION_NOT_FOUND) {
            return RecoveryDecision::RecreateSession;
        }
        if error.is_transient() {
            return RecoveryDecision::RetryAfter(error.retry_after().unwrap_or(backoff));
        }
    }

    RecoveryDecision::Surface {
        message: error.to_string(),
    }
}
