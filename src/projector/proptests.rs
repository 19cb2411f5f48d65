//! Property-based tests for the reducer
//!
//! These tests verify key invariants hold across arbitrary action sequences.

use super::action::*;
use super::reducer::reduce;
use super::state::*;
use crate::transport::is_transient;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_phase() -> impl Strategy<Value = ConversationPhase> {
    prop_oneof![
        Just(ConversationPhase::Greeting),
        Just(ConversationPhase::Collecting),
        Just(ConversationPhase::Confirming),
        Just(ConversationPhase::Complete),
        "[a-z]{3,10}".prop_map(ConversationPhase::Other),
    ]
}

fn arb_context() -> impl Strategy<Value = BotContext> {
    (
        proptest::option::of("[a-z]{1,10}"),
        proptest::option::of("[a-z ]{1,20}"),
        proptest::option::of("(low|medium|high)"),
        proptest::option::of("T-[0-9]{1,4}"),
        arb_phase(),
    )
        .prop_map(|(product, issue, urgency, ticket_id, state)| BotContext {
            product,
            issue,
            urgency,
            ticket_id,
            state,
        })
}

fn arb_message() -> impl Strategy<Value = ChatMessage> {
    ("[a-zA-Z ]{0,30}", any::<bool>(), any::<bool>()).prop_map(|(text, is_user, pending)| {
        if is_user {
            ChatMessage::user(text)
        } else if pending {
            ChatMessage::placeholder(text)
        } else {
            ChatMessage::assistant(text)
        }
    })
}

fn arb_patch() -> impl Strategy<Value = MessagePatch> {
    (
        proptest::option::of("[a-zA-Z ]{0,30}"),
        proptest::option::of(any::<bool>()),
        proptest::option::of(proptest::option::of("[a-z ]{1,20}")),
    )
        .prop_map(|(text, pending, error)| MessagePatch {
            text,
            pending,
            error,
        })
}

/// Actions other than `Initialize`, which may legitimately rewrite history.
/// Patches target an index into the current history, resolved at apply time.
#[derive(Debug, Clone)]
enum Step {
    Append(ChatMessage),
    Patch(usize, MessagePatch),
    PatchUnknown(MessagePatch),
    Context(BotContext),
    Pending(bool),
    Latency(u64),
    Error(String),
    Session(String),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => arb_message().prop_map(Step::Append),
        3 => (0usize..16, arb_patch()).prop_map(|(i, p)| Step::Patch(i, p)),
        1 => arb_patch().prop_map(Step::PatchUnknown),
        1 => arb_context().prop_map(Step::Context),
        1 => any::<bool>().prop_map(Step::Pending),
        1 => any::<u64>().prop_map(Step::Latency),
        1 => "[a-zA-Z ]{1,20}".prop_map(Step::Error),
        1 => "[a-z0-9]{8}".prop_map(Step::Session),
    ]
}

fn to_action(state: &SessionState, step: Step) -> Action {
    match step {
        Step::Append(message) => Action::AppendMessage(message),
        Step::Patch(index, patch) => {
            let id = if state.messages.is_empty() {
                "no-messages".to_string()
            } else {
                state.messages[index % state.messages.len()].id.clone()
            };
            Action::PatchMessage { id, patch }
        }
        Step::PatchUnknown(patch) => Action::PatchMessage {
            id: "not-a-real-id".to_string(),
            patch,
        },
        Step::Context(context) => Action::ReplaceContext(context),
        Step::Pending(pending) => Action::SetPending(pending),
        Step::Latency(ms) => Action::SetLatency(ms),
        Step::Error(error) => Action::PushError(error),
        Step::Session(id) => Action::SetSession(id),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_reduce_never_mutates_input(
        seed in proptest::collection::vec(arb_message(), 0..5),
        steps in proptest::collection::vec(arb_step(), 1..20),
    ) {
        let mut state = SessionState { messages: seed, ..SessionState::default() };
        for step in steps {
            let before = state.clone();
            let action = to_action(&state, step);
            let next = reduce(&state, action);
            prop_assert_eq!(&state, &before);
            state = next;
        }
    }

    #[test]
    fn prop_history_is_append_only(
        steps in proptest::collection::vec(arb_step(), 1..30),
    ) {
        let mut state = SessionState::default();
        for step in steps {
            let action = to_action(&state, step);
            let next = reduce(&state, action);

            prop_assert!(next.messages.len() >= state.messages.len());
            for (old, new) in state.messages.iter().zip(&next.messages) {
                prop_assert_eq!(&old.id, &new.id, "message order changed");
                prop_assert_eq!(old.role, new.role);
            }
            state = next;
        }
    }

    #[test]
    fn prop_error_log_only_grows(
        steps in proptest::collection::vec(arb_step(), 1..30),
    ) {
        let mut state = SessionState::default();
        for step in steps {
            let action = to_action(&state, step);
            let next = reduce(&state, action);

            prop_assert!(next.errors.len() >= state.errors.len());
            prop_assert_eq!(&next.errors[..state.errors.len()], &state.errors[..]);
            state = next;
        }
    }

    #[test]
    fn prop_settled_messages_stay_settled(
        steps in proptest::collection::vec(arb_step(), 1..30),
    ) {
        let mut state = SessionState::default();
        for step in steps {
            let action = to_action(&state, step);
            let next = reduce(&state, action);

            for old in state.messages.iter().filter(|m| !m.pending) {
                let new = next.message(&old.id).unwrap();
                prop_assert!(!new.pending, "message {} went back to pending", old.id);
            }
            state = next;
        }
    }

    #[test]
    fn prop_patch_unknown_id_is_noop(
        seed in proptest::collection::vec(arb_message(), 0..5),
        patch in arb_patch(),
    ) {
        let state = SessionState { messages: seed, ..SessionState::default() };
        let next = reduce(&state, Action::PatchMessage {
            id: "not-a-real-id".to_string(),
            patch,
        });
        prop_assert_eq!(next, state);
    }

    #[test]
    fn prop_context_replacement_is_exact(
        before in arb_context(),
        after in arb_context(),
    ) {
        let state = SessionState { context: before, ..SessionState::default() };
        let next = reduce(&state, Action::ReplaceContext(after.clone()));
        prop_assert_eq!(next.context, after);
    }

    #[test]
    fn prop_transient_matches_definition(status in any::<u16>()) {
        let expected = status == 408 || status == 429 || (500..600).contains(&status);
        prop_assert_eq!(is_transient(status), expected);
    }
}
