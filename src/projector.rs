//! Conversation state projector
//!
//! Implements the reducer-over-actions pattern: every state change is an
//! [`Action`] folded into a fresh immutable [`SessionState`] snapshot.

mod action;
mod reducer;
mod state;

#[cfg(test)]
mod proptests;

pub use action::{Action, MessagePatch, PartialSnapshot};
pub use reducer::reduce;
pub use state::{BotContext, ChatMessage, ConversationPhase, Role, SessionState};
