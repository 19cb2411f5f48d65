//! Intents that drive state transitions

use super::state::{BotContext, ChatMessage, SessionState};

/// State transition intents folded by [`super::reduce`]
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Overwrite the fields present in the snapshot
    Initialize(PartialSnapshot),
    SetSession(String),
    AppendMessage(ChatMessage),
    /// Update a message in place; unknown ids are ignored
    PatchMessage { id: String, patch: MessagePatch },
    /// The backend is authoritative for the context, so it is replaced wholesale
    ReplaceContext(BotContext),
    SetPending(bool),
    SetLatency(u64),
    PushError(String),
}

/// Subset of [`SessionState`] used when hydrating or resetting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSnapshot {
    pub session_id: Option<Option<String>>,
    pub messages: Option<Vec<ChatMessage>>,
    pub context: Option<BotContext>,
    pub pending: Option<bool>,
    pub last_latency_ms: Option<u64>,
    pub errors: Option<Vec<String>>,
}

impl From<SessionState> for PartialSnapshot {
    fn from(state: SessionState) -> Self {
        Self {
            session_id: Some(state.session_id),
            messages: Some(state.messages),
            context: Some(state.context),
            pending: Some(state.pending),
            last_latency_ms: Some(state.last_latency_ms),
            errors: Some(state.errors),
        }
    }
}

/// Field updates for a single message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub text: Option<String>,
    pub pending: Option<bool>,
    pub error: Option<Option<String>>,
}

impl MessagePatch {
    /// Reply arrived
    pub fn resolved(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            pending: Some(false),
            error: Some(None),
        }
    }

    /// Turn failed terminally
    pub fn failed(text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            pending: Some(false),
            error: Some(Some(error.into())),
        }
    }

    /// Settled without a reply and without an error (cancellation)
    pub fn abandoned(text: impl Into<String>) -> Self {
        Self::resolved(text)
    }
}
