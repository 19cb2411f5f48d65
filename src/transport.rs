//! Chat backend transport
//!
//! One request/response exchange per call, bounded by a deadline and a
//! cancellation token, with failures classified for the retry policy.

mod error;
mod http;
mod types;

pub use error::{is_transient, TransportError};
pub use http::HttpChatApi;
pub use types::{CreateSessionResponse, MessageRequest, MessageResponse};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-request cancellation handle and deadline
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub cancel: CancellationToken,
    pub timeout: Duration,
}

impl RequestOptions {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }
}

/// The two endpoints of the chat backend
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `POST /api/chat/session`
    async fn create_session(
        &self,
        opts: RequestOptions,
    ) -> Result<CreateSessionResponse, TransportError>;

    /// `POST /api/chat/message`
    async fn send_message(
        &self,
        request: &MessageRequest,
        opts: RequestOptions,
    ) -> Result<MessageResponse, TransportError>;
}

#[async_trait]
impl<T: ChatApi + ?Sized> ChatApi for Arc<T> {
    async fn create_session(
        &self,
        opts: RequestOptions,
    ) -> Result<CreateSessionResponse, TransportError> {
        (**self).create_session(opts).await
    }

    async fn send_message(
        &self,
        request: &MessageRequest,
        opts: RequestOptions,
    ) -> Result<MessageResponse, TransportError> {
        (**self).send_message(request, opts).await
    }
}

/// Logging wrapper for chat backends
pub struct LoggingChatApi<A> {
    inner: A,
}

impl<A: ChatApi> LoggingChatApi<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(endpoint: &str, started: Instant, result: &Result<T, TransportError>) {
    let duration = started.elapsed();
    match result {
        Ok(_) => {
            tracing::info!(
                endpoint,
                duration_ms = %duration.as_millis(),
                "Chat request completed"
            );
        }
        Err(TransportError::Cancelled) => {
            tracing::debug!(
                endpoint,
                duration_ms = %duration.as_millis(),
                "Chat request cancelled"
            );
        }
        Err(e) => {
            tracing::warn!(
                endpoint,
                duration_ms = %duration.as_millis(),
                status = ?e.status(),
                error = %e,
                transient = e.is_transient(),
                "Chat request failed"
            );
        }
    }
}

#[async_trait]
impl<A: ChatApi> ChatApi for LoggingChatApi<A> {
    async fn create_session(
        &self,
        opts: RequestOptions,
    ) -> Result<CreateSessionResponse, TransportError> {
        let started = Instant::now();
        let result = self.inner.create_session(opts).await;
        log_outcome("session", started, &result);
        result
    }

    async fn send_message(
        &self,
        request: &MessageRequest,
        opts: RequestOptions,
    ) -> Result<MessageResponse, TransportError> {
        let started = Instant::now();
        let result = self.inner.send_message(request, opts).await;
        log_outcome("message", started, &result);
        result
    }
}
