//! Pure state reducer
//!
//! Given the same snapshot and action it always produces the same result and
//! never touches the input snapshot.

use super::action::{Action, MessagePatch, PartialSnapshot};
use super::state::{ChatMessage, SessionState};

pub fn reduce(state: &SessionState, action: Action) -> SessionState {
    let mut next = state.clone();

    match action {
        Action::Initialize(snapshot) => apply_snapshot(&mut next, snapshot),
        Action::SetSession(session_id) => next.session_id = Some(session_id),
        Action::AppendMessage(message) => next.messages.push(message),
        Action::PatchMessage { id, patch } => {
            if let Some(message) = next.messages.iter_mut().find(|m| m.id == id) {
                apply_patch(message, patch);
            }
        }
        Action::ReplaceContext(context) => next.context = context,
        Action::SetPending(pending) => next.pending = pending,
        Action::SetLatency(ms) => next.last_latency_ms = ms,
        Action::PushError(error) => next.errors.push(error),
    }

    next
}

fn apply_snapshot(state: &mut SessionState, snapshot: PartialSnapshot) {
    let PartialSnapshot {
        session_id,
        messages,
        context,
        pending,
        last_latency_ms,
        errors,
    } = snapshot;

    if let Some(session_id) = session_id {
        state.session_id = session_id;
    }
    if let Some(messages) = messages {
        state.messages = messages;
    }
    if let Some(context) = context {
        state.context = context;
    }
    if let Some(pending) = pending {
        state.pending = pending;
    }
    if let Some(ms) = last_latency_ms {
        state.last_latency_ms = ms;
    }
    if let Some(errors) = errors {
        state.errors = errors;
    }
}

fn apply_patch(message: &mut ChatMessage, patch: MessagePatch) {
    if let Some(text) = patch.text {
        message.text = text;
    }
    if let Some(error) = patch.error {
        message.error = error;
    }
    // Settled messages never go back to pending
    match patch.pending {
        Some(true) if !message.pending => {}
        Some(pending) => message.pending = pending,
        None => {}
    }
}
