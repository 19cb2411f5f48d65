//! Background snapshot writer
//!
//! Saves are queued without waiting and applied in mutation order by a single
//! task. A burst of saves collapses into one write of the newest snapshot.

use super::traits::SnapshotStore;
use crate::projector::SessionState;
use tokio::sync::{mpsc, oneshot};

enum PersistCommand {
    Save(SessionState),
    Clear(oneshot::Sender<()>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task
#[derive(Clone)]
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl SnapshotWriter {
    pub fn spawn<S: SnapshotStore + 'static>(store: S) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, rx));
        Self { tx }
    }

    /// Queue a snapshot for persistence
    pub fn save(&self, state: SessionState) {
        if self.tx.send(PersistCommand::Save(state)).is_err() {
            tracing::warn!("Snapshot writer stopped; dropping save");
        }
    }

    /// Remove the persisted snapshot once every earlier save has landed
    pub async fn clear(&self) {
        self.request(PersistCommand::Clear).await;
    }

    /// Wait until every queued save has been written
    pub async fn flush(&self) {
        self.request(PersistCommand::Flush).await;
    }

    async fn request(&self, command: impl FnOnce(oneshot::Sender<()>) -> PersistCommand) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(command(ack_tx)).is_err() || ack_rx.await.is_err() {
            tracing::warn!("Snapshot writer stopped before acknowledging");
        }
    }
}

async fn run<S: SnapshotStore>(store: S, mut rx: mpsc::UnboundedReceiver<PersistCommand>) {
    let mut deferred: Option<PersistCommand> = None;

    loop {
        let command = match deferred.take() {
            Some(command) => command,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            PersistCommand::Save(mut state) => {
                while let Ok(next) = rx.try_recv() {
                    match next {
                        PersistCommand::Save(newer) => state = newer,
                        other => {
                            deferred = Some(other);
                            break;
                        }
                    }
                }
                write_snapshot(&store, &state).await;
            }
            PersistCommand::Clear(ack) => {
                store.clear_all().await;
                let _ = ack.send(());
            }
            PersistCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    tracing::debug!("Snapshot writer stopped");
}

async fn write_snapshot<S: SnapshotStore>(store: &S, state: &SessionState) {
    if let Some(session_id) = &state.session_id {
        store.save_session_id(session_id).await;
    }
    store.save_messages(&state.messages).await;
    store.save_context(&state.context).await;
}
