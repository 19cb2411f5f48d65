//! Transport error types

use std::time::Duration;
use thiserror::Error;

/// Status reported for a request that exceeded its deadline
pub const TIMEOUT_STATUS: u16 = 408;

/// Failure of a single request/response exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The deadline elapsed before the exchange settled
    #[error("Request timed out")]
    Timeout,
    /// Superseded by a newer request or cancelled by the user
    #[error("Request cancelled")]
    Cancelled,
    /// Non-2xx response, connection failure, or unreadable success body.
    /// `status` is `None` when no HTTP status applies.
    #[error("{message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },
}

impl TransportError {
    pub fn request_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a server-suggested delay (only meaningful for `RequestFailed`)
    #[must_use]
    pub fn with_retry_after(self, delay: Duration) -> Self {
        match self {
            Self::RequestFailed {
                status, message, ..
            } => Self::RequestFailed {
                status,
                message,
                retry_after: Some(delay),
            },
            other => other,
        }
    }

    /// HTTP-like status; timeouts report 408
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Timeout => Some(TIMEOUT_STATUS),
            Self::Cancelled => None,
            Self::RequestFailed { status, .. } => *status,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RequestFailed { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether an automatic retry is worthwhile
    pub fn is_transient(&self) -> bool {
        self.status().is_some_and(is_transient)
    }
}

/// Timeouts, rate limiting and server errors are expected to clear up on retry.
pub fn is_transient(status: u16) -> bool {
    status == TIMEOUT_STATUS || status == 429 || (500..600).contains(&status)
}
