//! HTTP implementation of the chat backend

use super::types::{CreateSessionResponse, ErrorBody, MessageRequest, MessageResponse};
use super::{ChatApi, RequestOptions, TransportError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

pub const SESSION_PATH: &str = "/api/chat/session";
pub const MESSAGE_PATH: &str = "/api/chat/message";

/// Chat backend reached over HTTP/JSON
pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        // Deadlines come from RequestOptions; only bound the connect phase here.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
        opts: &RequestOptions,
    ) -> Result<R, TransportError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);

        let exchange = async {
            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(classify_reqwest_error)?;

            let status = response.status();
            let bytes = response.bytes().await.map_err(classify_reqwest_error)?;

            if !status.is_success() {
                return Err(error_from_body(status.as_u16(), &bytes));
            }

            serde_json::from_slice::<R>(&bytes).map_err(|e| {
                TransportError::request_failed(None, format!("Failed to parse response: {e}"))
            })
        };

        with_deadline(exchange, opts).await
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn create_session(
        &self,
        opts: RequestOptions,
    ) -> Result<CreateSessionResponse, TransportError> {
        self.post_json(SESSION_PATH, &serde_json::json!({}), &opts)
            .await
    }

    async fn send_message(
        &self,
        request: &MessageRequest,
        opts: RequestOptions,
    ) -> Result<MessageResponse, TransportError> {
        self.post_json(MESSAGE_PATH, request, &opts).await
    }
}

/// Race an exchange against the caller's cancellation token and a timer.
///
/// When the timer wins, the token is cancelled so anything else watching it
/// stops too, and the exchange future is dropped (aborting the request).
pub async fn with_deadline<T, F>(exchange: F, opts: &RequestOptions) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::select! {
        biased;

        () = opts.cancel.cancelled() => Err(TransportError::Cancelled),

        () = tokio::time::sleep(opts.timeout) => {
            opts.cancel.cancel();
            Err(TransportError::Timeout)
        }

        result = exchange => result,
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::request_failed(
            e.status().map(|s| s.as_u16()),
            format!("Network request failed: {e}"),
        )
    }
}

/// Build the error for a non-2xx response from its (possibly unparseable) body
pub(crate) fn error_from_body(status: u16, body: &[u8]) -> TransportError {
    let parsed = serde_json::from_slice::<ErrorBody>(body).unwrap_or_default();

    let message = parsed
        .error
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"));

    let err = TransportError::request_failed(Some(status), message);
    // Negative, NaN and overflowing hints are dropped
    match parsed
        .retry_after_ms
        .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
    {
        Some(delay) => err.with_retry_after(delay),
        None => err,
    }
}
