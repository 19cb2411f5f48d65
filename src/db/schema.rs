//! Snapshot store schema

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS snapshot (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub const KEY_SESSION_ID: &str = "supportChat.sessionId";
pub const KEY_MESSAGES: &str = "supportChat.messages";
pub const KEY_CONTEXT: &str = "supportChat.context";

/// Every key owned by the session snapshot
pub const ALL_KEYS: [&str; 3] = [KEY_SESSION_ID, KEY_MESSAGES, KEY_CONTEXT];
