//! Trait abstractions for runtime I/O
//!
//! The orchestrator only depends on the load/save contract; tests and the
//! binary plug in different stores.

use crate::db::{Database, DbError, KEY_CONTEXT, KEY_MESSAGES, KEY_SESSION_ID, ALL_KEYS};
use crate::projector::{BotContext, ChatMessage};
use async_trait::async_trait;
use std::sync::Arc;

/// Local persistence of the last known session snapshot.
///
/// Saves are best-effort and loads return `None` for anything missing or
/// unreadable, so implementations never fail the caller.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_session_id(&self, session_id: &str);
    async fn load_session_id(&self) -> Option<String>;

    async fn save_messages(&self, messages: &[ChatMessage]);
    async fn load_messages(&self) -> Option<Vec<ChatMessage>>;

    async fn save_context(&self, context: &BotContext);
    async fn load_context(&self) -> Option<BotContext>;

    /// Remove every key owned by the snapshot
    async fn clear_all(&self);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    async fn save_session_id(&self, session_id: &str) {
        (**self).save_session_id(session_id).await;
    }

    async fn load_session_id(&self) -> Option<String> {
        (**self).load_session_id().await
    }

    async fn save_messages(&self, messages: &[ChatMessage]) {
        (**self).save_messages(messages).await;
    }

    async fn load_messages(&self) -> Option<Vec<ChatMessage>> {
        (**self).load_messages().await
    }

    async fn save_context(&self, context: &BotContext) {
        (**self).save_context(context).await;
    }

    async fn load_context(&self) -> Option<BotContext> {
        (**self).load_context().await
    }

    async fn clear_all(&self) {
        (**self).clear_all().await;
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a `SnapshotStore`
#[derive(Clone)]
pub struct DatabaseSnapshots {
    db: Database,
}

impl DatabaseSnapshots {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn log_save_failure(key: &str, result: Result<(), DbError>) {
    if let Err(e) = result {
        tracing::warn!(key, error = %e, "Failed to persist snapshot value");
    }
}

fn log_load_failure<T>(key: &str, result: Result<Option<T>, DbError>) -> Option<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "Ignoring unreadable snapshot value");
        None
    })
}

#[async_trait]
impl SnapshotStore for DatabaseSnapshots {
    async fn save_session_id(&self, session_id: &str) {
        log_save_failure(KEY_SESSION_ID, self.db.put_json(KEY_SESSION_ID, session_id));
    }

    async fn load_session_id(&self) -> Option<String> {
        log_load_failure(KEY_SESSION_ID, self.db.get_json(KEY_SESSION_ID))
    }

    async fn save_messages(&self, messages: &[ChatMessage]) {
        log_save_failure(KEY_MESSAGES, self.db.put_json(KEY_MESSAGES, messages));
    }

    async fn load_messages(&self) -> Option<Vec<ChatMessage>> {
        log_load_failure(KEY_MESSAGES, self.db.get_json(KEY_MESSAGES))
    }

    async fn save_context(&self, context: &BotContext) {
        log_save_failure(KEY_CONTEXT, self.db.put_json(KEY_CONTEXT, context));
    }

    async fn load_context(&self) -> Option<BotContext> {
        log_load_failure(KEY_CONTEXT, self.db.get_json(KEY_CONTEXT))
    }

    async fn clear_all(&self) {
        if let Err(e) = self.db.delete(&ALL_KEYS) {
            tracing::warn!(error = %e, "Failed to clear snapshot");
        }
    }
}
