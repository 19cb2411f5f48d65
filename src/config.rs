//! Environment-driven configuration

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://chatbot-backend-54sk.onrender.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub base_url: String,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
    pub message_timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            db_path: default_db_path(std::env::var("HOME").ok()),
            request_timeout: Duration::from_millis(20_000),
            message_timeout: Duration::from_millis(15_000),
            retry_backoff: Duration::from_millis(800),
        }
    }
}

fn default_db_path(home: Option<String>) -> PathBuf {
    let home = home.unwrap_or_else(|| "/tmp".to_string());
    PathBuf::from(home).join(".support-chat").join("snapshot.db")
}

impl ChatConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; unparseable numbers keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };

        Self {
            base_url: lookup("SUPPORT_CHAT_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.base_url),
            db_path: lookup("SUPPORT_CHAT_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .map_or_else(|| default_db_path(lookup("HOME")), PathBuf::from),
            request_timeout: millis("SUPPORT_CHAT_REQUEST_TIMEOUT_MS", defaults.request_timeout),
            message_timeout: millis("SUPPORT_CHAT_MESSAGE_TIMEOUT_MS", defaults.message_timeout),
            retry_backoff: millis("SUPPORT_CHAT_RETRY_BACKOFF_MS", defaults.retry_backoff),
        }
    }
}
