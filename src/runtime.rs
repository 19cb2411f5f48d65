//! Session runtime
//!
//! Drives a conversation against the chat backend: validation, request
//! sequencing, recovery and persistence of the resulting snapshots.

mod input;
mod orchestrator;
mod persister;
mod recovery;
pub mod traits;


pub use input::ValidationError;
pub use orchestrator::SessionOrchestrator;
pub use traits::*;

use crate::config::ChatConfig;
use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

pub const WELCOME_TEXT: &str =
    "Hi! I’m your support assistant. What product can I help you with today?";
pub const PLACEHOLDER_TEXT: &str = "Assistant is thinking…";
pub const FAILED_TEXT: &str = "Failed to get a reply.";
pub const CANCELLED_TEXT: &str = "Request cancelled.";
pub const TOO_LONG_TEXT: &str = "Message too long. Please shorten it.";
pub const TOO_LONG_ERROR_CODE: &str = "413";
pub const TOO_LONG_LOG: &str = "Message too long (max 500)";
pub const INTERRUPTED_ERROR: &str = "Interrupted before a reply arrived";

/// Why an operation could not start a turn
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Could not start a chat session: {0}")]
    SessionUnavailable(#[source] TransportError),
    #[error("Nothing to retry")]
    NothingToRetry,
}

/// Per-send behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Allow one automatic recovery (session re-creation or transient retry)
    pub auto_retry: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self { auto_retry: true }
    }
}

/// Deadlines and backoff used by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Session creation
    pub request_timeout: Duration,
    /// Message exchange
    pub message_timeout: Duration,
    /// Delay before retrying a transient failure without a server hint
    pub retry_backoff: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            message_timeout: Duration::from_secs(15),
            retry_backoff: Duration::from_millis(800),
        }
    }
}

impl From<&ChatConfig> for DispatchSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            message_timeout: config.message_timeout,
            retry_backoff: config.retry_backoff,
        }
    }
}
