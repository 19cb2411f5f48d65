//! Conversation state types

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single entry of the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
    /// Assistant placeholder still waiting on the backend
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            // Stored with millisecond precision
            ts: Utc::now().trunc_subsecs(3),
            pending: false,
            error: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Assistant message inserted before the reply arrives
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self {
            pending: true,
            ..Self::new(Role::Assistant, text)
        }
    }

    /// Assistant message that is already settled as failed
    pub fn assistant_error(text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(Role::Assistant, text)
        }
    }
}

// ============================================================================
// Bot Context
// ============================================================================

/// Phase of the intent-gathering dialogue. The backend may introduce phases
/// this client does not know about; those are carried through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    Greeting,
    Collecting,
    Confirming,
    Complete,
    #[serde(untagged)]
    Other(String),
}

/// Slot-filling state maintained by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotContext {
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub state: ConversationPhase,
}

// ============================================================================
// Session State
// ============================================================================

/// Aggregate root of one running conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub context: BotContext,
    /// A request is outstanding
    pub pending: bool,
    pub last_latency_ms: u64,
    /// Append-only failure log; only the last entry is shown
    pub errors: Vec<String>,
}

impl SessionState {
    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Most recent failure, hidden while a request is outstanding
    pub fn last_error(&self) -> Option<&str> {
        if self.pending {
            return None;
        }
        self.errors.last().map(String::as_str)
    }

    /// The backend is waiting on a yes/no answer
    pub fn awaiting_confirmation(&self) -> bool {
        self.context.state == ConversationPhase::Confirming
    }

    /// Ticket id once the dialogue has completed
    pub fn completed_ticket(&self) -> Option<&str> {
        match self.context.state {
            ConversationPhase::Complete => self.context.ticket_id.as_deref(),
            _ => None,
        }
    }
}
