//! Session orchestrator
//!
//! Owns the single source of truth for a conversation. Every mutation goes
//! through [`reduce`], is published on a watch channel and queued for
//! persistence. At most one turn is active; a completion whose generation no
//! longer matches the active turn is dropped. Work begun before a reset
//! belongs to an older epoch and never touches the fresh conversation.

use super::input::{normalize, truncate_chars, ValidationError, MAX_MESSAGE_CHARS};
use super::persister::SnapshotWriter;
use super::recovery::{decide, RecoveryDecision};
use super::traits::SnapshotStore;
use super::{
    DispatchSettings, SendOptions, SessionError, CANCELLED_TEXT, FAILED_TEXT, INTERRUPTED_ERROR,
    PLACEHOLDER_TEXT, TOO_LONG_ERROR_CODE, TOO_LONG_LOG, TOO_LONG_TEXT, WELCOME_TEXT,
};
use crate::projector::{
    reduce, Action, ChatMessage, MessagePatch, PartialSnapshot, SessionState,
};
use crate::transport::{ChatApi, MessageRequest, RequestOptions, TransportError};
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;

/// The turn currently allowed to mutate state
#[derive(Debug, Clone)]
struct Turn {
    generation: u64,
    cancel: CancellationToken,
    placeholder_id: String,
}

pub struct SessionOrchestrator<A: ChatApi> {
    api: A,
    writer: SnapshotWriter,
    settings: DispatchSettings,
    state: watch::Sender<SessionState>,
    active: Mutex<Option<Turn>>,
    generation: AtomicU64,
    /// Bumped by `reset` while holding `active`
    epoch: AtomicU64,
    /// Serializes session creation
    session_gate: AsyncMutex<()>,
    last_attempted: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fresh greeting state with a single welcome message
fn welcome_state() -> SessionState {
    reduce(
        &SessionState::default(),
        Action::AppendMessage(ChatMessage::assistant(WELCOME_TEXT)),
    )
}

impl<A: ChatApi> SessionOrchestrator<A> {
    /// Restore the last snapshot from `store` and start persisting into it.
    ///
    /// Empty history is seeded with the welcome message. Placeholders left
    /// pending by an interrupted run are settled as failed.
    pub async fn hydrate<S: SnapshotStore + 'static>(
        api: A,
        store: S,
        settings: DispatchSettings,
    ) -> Self {
        let (session_id, messages, context) = tokio::join!(
            store.load_session_id(),
            store.load_messages(),
            store.load_context()
        );

        let mut state = reduce(
            &SessionState::default(),
            Action::Initialize(PartialSnapshot {
                session_id: Some(session_id),
                messages,
                context,
                ..PartialSnapshot::default()
            }),
        );

        if state.messages.is_empty() {
            state = welcome_state();
        }

        let interrupted: Vec<String> = state
            .messages
            .iter()
            .filter(|m| m.pending)
            .map(|m| m.id.clone())
            .collect();
        for id in interrupted {
            state = reduce(
                &state,
                Action::PatchMessage {
                    id,
                    patch: MessagePatch::failed(FAILED_TEXT, INTERRUPTED_ERROR),
                },
            );
        }

        tracing::info!(
            session_id = ?state.session_id,
            messages = state.messages.len(),
            "Hydrated chat session"
        );

        let writer = SnapshotWriter::spawn(store);
        writer.save(state.clone());
        Self::new(api, writer, settings, state)
    }

    pub fn new(
        api: A,
        writer: SnapshotWriter,
        settings: DispatchSettings,
        initial: SessionState,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            api,
            writer,
            settings,
            state,
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            session_gate: AsyncMutex::new(()),
            last_attempted: Mutex::new(None),
        }
    }

    // ==================== State Access ====================

    /// Subscribe to state snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Wait until every mutation so far has been persisted
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    fn apply(&self, action: Action) {
        let writer = &self.writer;
        self.state.send_modify(|state| {
            *state = reduce(state, action);
            writer.save(state.clone());
        });
    }

    fn apply_all(&self, actions: impl IntoIterator<Item = Action>) {
        for action in actions {
            self.apply(action);
        }
    }

    // ==================== Turn Bookkeeping ====================

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Apply `actions` only if no reset happened since `epoch`
    fn apply_in_epoch(&self, epoch: u64, actions: impl IntoIterator<Item = Action>) -> bool {
        let _active = lock(&self.active);
        if self.current_epoch() == epoch {
            self.apply_all(actions);
            true
        } else {
            false
        }
    }

    fn is_active(&self, generation: u64) -> bool {
        lock(&self.active)
            .as_ref()
            .is_some_and(|turn| turn.generation == generation)
    }

    /// Apply `actions` only if `generation` is still the active turn.
    /// The check and the mutation happen under the same lock.
    fn apply_if_active(&self, generation: u64, actions: impl IntoIterator<Item = Action>) -> bool {
        let active = lock(&self.active);
        if active.as_ref().is_some_and(|turn| turn.generation == generation) {
            self.apply_all(actions);
            true
        } else {
            false
        }
    }

    /// Supersede any previous turn and start a new one for `text`.
    /// Returns `None` if the conversation was reset since `epoch`.
    fn begin_turn(&self, text: &str, epoch: u64) -> Option<Turn> {
        let mut active = lock(&self.active);
        if self.current_epoch() != epoch {
            return None;
        }

        let placeholder = ChatMessage::placeholder(PLACEHOLDER_TEXT);
        let turn = Turn {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            cancel: CancellationToken::new(),
            placeholder_id: placeholder.id.clone(),
        };

        if let Some(previous) = self.abandon(&mut active) {
            tracing::debug!(generation = previous.generation, "Superseded by a new turn");
        }
        *active = Some(turn.clone());
        self.apply_all([
            Action::AppendMessage(ChatMessage::user(text)),
            Action::AppendMessage(placeholder),
            Action::SetPending(true),
        ]);
        Some(turn)
    }

    /// Cancel the active turn and settle its placeholder without an error.
    /// Callers hold the `active` lock.
    fn abandon(&self, active: &mut Option<Turn>) -> Option<Turn> {
        let turn = active.take()?;
        turn.cancel.cancel();
        self.apply(Action::SetPending(false));
        if self.read(|s| s.message(&turn.placeholder_id).is_some_and(|m| m.pending)) {
            self.apply(Action::PatchMessage {
                id: turn.placeholder_id.clone(),
                patch: MessagePatch::abandoned(CANCELLED_TEXT),
            });
        }
        Some(turn)
    }

    /// Clear the active turn and `pending`, unless a newer turn took over
    fn settle(&self, generation: u64) {
        let mut active = lock(&self.active);
        if active.as_ref().is_some_and(|turn| turn.generation == generation) {
            *active = None;
            self.apply(Action::SetPending(false));
        }
    }

    fn remember_attempt(&self, text: &str) {
        *lock(&self.last_attempted) = Some(text.to_string());
    }

    // ==================== Public Operations ====================

    /// Create a backend session unless one is already known
    pub async fn ensure_session(&self) -> Result<String, TransportError> {
        self.ensure_session_in(self.current_epoch()).await
    }

    /// Concurrent callers share one creation. A session created across a
    /// reset is returned but not recorded.
    async fn ensure_session_in(&self, epoch: u64) -> Result<String, TransportError> {
        if let Some(existing) = self.read(|s| s.session_id.clone()) {
            return Ok(existing);
        }

        let _gate = self.session_gate.lock().await;
        if let Some(existing) = self.read(|s| s.session_id.clone()) {
            return Ok(existing);
        }

        let opts = RequestOptions::new(CancellationToken::new(), self.settings.request_timeout);
        let created = self.api.create_session(opts).await?;
        if self.apply_in_epoch(epoch, [Action::SetSession(created.session_id.clone())]) {
            tracing::info!(session_id = %created.session_id, "Created chat session");
        } else {
            tracing::debug!(session_id = %created.session_id, "Session created across a reset");
        }
        Ok(created.session_id)
    }

    /// Validate `text` and run one turn with it.
    ///
    /// A failed turn is still `Ok`: the failure is recorded in state. Errors
    /// are returned only when no turn could be started.
    pub async fn send_user_message(
        &self,
        text: &str,
        opts: SendOptions,
    ) -> Result<(), SessionError> {
        match normalize(text) {
            Ok(text) => self.dispatch(&text, opts.auto_retry).await,
            Err(ValidationError::Empty) => Err(ValidationError::Empty.into()),
            Err(err @ ValidationError::TooLong { .. }) => {
                tracing::info!(error = %err, "Rejected message");
                let truncated = truncate_chars(text.trim(), MAX_MESSAGE_CHARS);
                self.apply_all([
                    Action::PushError(TOO_LONG_LOG.to_string()),
                    Action::AppendMessage(ChatMessage::user(truncated)),
                    Action::AppendMessage(ChatMessage::assistant_error(
                        TOO_LONG_TEXT,
                        TOO_LONG_ERROR_CODE,
                    )),
                ]);
                Err(err.into())
            }
        }
    }

    /// Re-run the most recently attempted text without automatic recovery
    pub async fn retry_last(&self) -> Result<(), SessionError> {
        let last = lock(&self.last_attempted).clone();
        let Some(text) = last else {
            return Err(SessionError::NothingToRetry);
        };
        self.dispatch(&text, false).await
    }

    /// Cancel the outstanding request, if any. Returns whether one was cancelled.
    pub fn cancel_in_flight(&self) -> bool {
        let cancelled = self.abandon(&mut lock(&self.active));
        match cancelled {
            Some(turn) => {
                tracing::info!(generation = turn.generation, "Cancelled in-flight request");
                true
            }
            None => false,
        }
    }

    /// Drop the conversation and start over with a fresh greeting.
    ///
    /// Turns and session creations already under way are detached: their
    /// results never reach the new conversation.
    pub async fn reset(&self) {
        {
            let mut active = lock(&self.active);
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if let Some(turn) = active.take() {
                turn.cancel.cancel();
                tracing::debug!(generation = turn.generation, "Dropped in-flight turn");
            }
            *lock(&self.last_attempted) = None;
            self.apply(Action::Initialize(PartialSnapshot::from(welcome_state())));
        }

        self.writer.clear().await;
        // The clear also wiped saves queued ahead of it; persist what is current
        let writer = &self.writer;
        self.state.send_if_modified(|state| {
            writer.save(state.clone());
            false
        });
        tracing::info!("Reset chat session");
    }

    // ==================== Dispatch ====================

    async fn dispatch(&self, text: &str, auto_retry: bool) -> Result<(), SessionError> {
        let epoch = self.current_epoch();
        self.remember_attempt(text);

        if let Err(e) = self.ensure_session_in(epoch).await {
            tracing::warn!(error = %e, "Could not create chat session");
            self.apply_in_epoch(epoch, [Action::PushError(e.to_string())]);
            return Err(SessionError::SessionUnavailable(e));
        }

        let Some(turn) = self.begin_turn(text, epoch) else {
            tracing::debug!("Chat was reset before the turn started");
            return Ok(());
        };
        tracing::debug!(generation = turn.generation, auto_retry, "Dispatching message");

        self.attempt(&turn, text, auto_retry).await;
        self.settle(turn.generation);
        Ok(())
    }

    /// One exchange for `turn`, followed by at most one level of recovery
    fn attempt<'a>(&'a self, turn: &'a Turn, text: &'a str, auto_retry: bool) -> BoxFuture<'a, ()> {
        async move {
            if !self.is_active(turn.generation) {
                return;
            }

            let (session_id, context) =
                self.read(|s| (s.session_id.clone().unwrap_or_default(), s.context.clone()));
            let request = MessageRequest {
                session_id,
                message: text.to_string(),
                context: Some(context),
            };
            let opts = RequestOptions::new(turn.cancel.child_token(), self.settings.message_timeout);

            let started = Instant::now();
            let result = self.api.send_message(&request, opts).await;
            let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let error = match result {
                Ok(response) => {
                    let applied = self.apply_if_active(
                        turn.generation,
                        [
                            Action::SetLatency(latency_ms),
                            Action::PatchMessage {
                                id: turn.placeholder_id.clone(),
                                patch: MessagePatch::resolved(response.reply),
                            },
                            Action::ReplaceContext(response.context),
                        ],
                    );
                    if applied {
                        tracing::info!(
                            session_id = %request.session_id,
                            generation = turn.generation,
                            latency_ms,
                            "Reply received"
                        );
                    } else {
                        tracing::debug!(generation = turn.generation, "Discarding stale reply");
                    }
                    return;
                }
                Err(e) => e,
            };

            if !self.is_active(turn.generation) {
                tracing::debug!(generation = turn.generation, "Discarding stale failure");
                return;
            }

            match decide(&error, auto_retry, self.settings.retry_backoff) {
                RecoveryDecision::RecreateSession => {
                    self.recreate_session_and_retry(turn, text, &error).await;
                }
                RecoveryDecision::RetryAfter(delay) => {
                    tracing::info!(
                        generation = turn.generation,
                        status = ?error.status(),
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying transient failure"
                    );
                    tokio::select! {
                        biased;
                        () = turn.cancel.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            self.attempt(turn, text, false).await;
                        }
                    }
                }
                RecoveryDecision::Surface { message } => self.fail_turn(turn, message),
                RecoveryDecision::Abandon => {
                    self.apply_if_active(
                        turn.generation,
                        [Action::PatchMessage {
                            id: turn.placeholder_id.clone(),
                            patch: MessagePatch::abandoned(CANCELLED_TEXT),
                        }],
                    );
                }
            }
        }
        .boxed()
    }

    async fn recreate_session_and_retry(&self, turn: &Turn, text: &str, original: &TransportError) {
        tracing::info!(generation = turn.generation, "Session not found, creating a new one");

        let opts = RequestOptions::new(turn.cancel.child_token(), self.settings.request_timeout);
        match self.api.create_session(opts).await {
            Ok(created) => {
                let session_id = created.session_id;
                if self.apply_if_active(turn.generation, [Action::SetSession(session_id.clone())]) {
                    tracing::info!(session_id = %session_id, "Recreated chat session");
                    self.attempt(turn, text, false).await;
                }
            }
            Err(TransportError::Cancelled) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Session recreation failed");
                self.fail_turn(turn, original.to_string());
            }
        }
    }

    /// Terminal failure: log the message and settle the placeholder as failed
    fn fail_turn(&self, turn: &Turn, message: String) {
        tracing::warn!(generation = turn.generation, error = %message, "Turn failed");
        self.apply_if_active(
            turn.generation,
            [
                Action::PushError(message.clone()),
                Action::PatchMessage {
                    id: turn.placeholder_id.clone(),
                    patch: MessagePatch::failed(FAILED_TEXT, message),
                },
            ],
        );
    }
}
