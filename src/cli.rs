//! Line-oriented terminal front end
//!
//! Reads commands from stdin and prints the transcript as the session state
//! changes. Sends run in spawned tasks so `/cancel` works while waiting.

use crate::projector::{ChatMessage, Role, SessionState};
use crate::runtime::{SendOptions, SessionError, SessionOrchestrator};
use crate::transport::ChatApi;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

const HELP: &str = "Commands: /retry /cancel /reset /yes /no /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Confirm(bool),
    Retry,
    Cancel,
    Reset,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => Self::Empty,
            "/retry" => Self::Retry,
            "/cancel" => Self::Cancel,
            "/reset" => Self::Reset,
            "/yes" => Self::Confirm(true),
            "/no" => Self::Confirm(false),
            "/quit" | "/exit" => Self::Quit,
            cmd if cmd.starts_with('/') => Self::Unknown(cmd.to_string()),
            _ => Self::Send(line.to_string()),
        }
    }
}

/// Text sent to the backend for a `/yes` or `/no` answer
fn confirmation_reply(yes: bool) -> &'static str {
    if yes {
        "Yes"
    } else {
        "No"
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Turns successive snapshots into transcript lines, printing only what changed
#[derive(Debug, Default)]
pub struct Renderer {
    shown: Vec<ChatMessage>,
    latency_ms: u64,
    confirming: bool,
    ticket: Option<String>,
    error_count: usize,
}

fn format_message(message: &ChatMessage) -> String {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    match &message.error {
        Some(error) => format!("{who}: {} [{error}]", message.text),
        None => format!("{who}: {}", message.text),
    }
}

impl Renderer {
    pub fn render(&mut self, state: &SessionState) -> Vec<String> {
        let mut lines = Vec::new();

        let restarted = state.messages.len() < self.shown.len()
            || self
                .shown
                .first()
                .zip(state.messages.first())
                .is_some_and(|(old, new)| old.id != new.id);
        if restarted {
            lines.push("--- new conversation ---".to_string());
            self.shown.clear();
            self.latency_ms = 0;
        }

        for (index, message) in state.messages.iter().enumerate() {
            match self.shown.get_mut(index) {
                Some(shown) if shown == message => {}
                Some(shown) => {
                    lines.push(format_message(message));
                    *shown = message.clone();
                }
                None => {
                    lines.push(format_message(message));
                    self.shown.push(message.clone());
                }
            }
        }

        if state.last_latency_ms != self.latency_ms {
            self.latency_ms = state.last_latency_ms;
            if state.last_latency_ms > 0 {
                lines.push(format!("(replied in {} ms)", state.last_latency_ms));
            }
        }

        let confirming = state.awaiting_confirmation();
        if confirming && !self.confirming {
            lines.push("Is that correct? Type /yes or /no.".to_string());
        }
        self.confirming = confirming;

        let ticket = state.completed_ticket().map(str::to_string);
        if ticket != self.ticket {
            if let Some(ticket) = &ticket {
                lines.push(format!("✔ Ticket {ticket} created"));
            }
            self.ticket = ticket;
        }

        if !state.pending && state.errors.len() != self.error_count {
            self.error_count = state.errors.len();
            if let Some(error) = state.last_error() {
                lines.push(format!("error: {error} (type /retry to try again)"));
            }
        }

        lines
    }
}

async fn render_loop(mut rx: watch::Receiver<SessionState>) {
    let mut renderer = Renderer::default();
    loop {
        let lines = renderer.render(&rx.borrow_and_update());
        for line in lines {
            println!("{line}");
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

// ============================================================================
// Input Loop
// ============================================================================

fn report(error: &SessionError) {
    match error {
        SessionError::NothingToRetry => println!("Nothing to retry yet."),
        // Everything else is already visible in the transcript
        other => tracing::debug!(error = %other, "Turn not started"),
    }
}

fn spawn_send<A: ChatApi + 'static>(orchestrator: &Arc<SessionOrchestrator<A>>, text: String) {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        if let Err(e) = orchestrator
            .send_user_message(&text, SendOptions::default())
            .await
        {
            report(&e);
        }
    });
}

fn spawn_retry<A: ChatApi + 'static>(orchestrator: &Arc<SessionOrchestrator<A>>) {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        if let Err(e) = orchestrator.retry_last().await {
            report(&e);
        }
    });
}

/// Run the chat until stdin closes or the user quits
pub async fn run<A: ChatApi + 'static>(
    orchestrator: Arc<SessionOrchestrator<A>>,
) -> std::io::Result<()> {
    println!("{HELP}");
    let render = tokio::spawn(render_loop(orchestrator.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Empty => {}
            Command::Send(text) => spawn_send(&orchestrator, text),
            Command::Confirm(yes) => {
                if orchestrator.snapshot().awaiting_confirmation() {
                    spawn_send(&orchestrator, confirmation_reply(yes).to_string());
                } else {
                    println!("Nothing to confirm right now.");
                }
            }
            Command::Retry => spawn_retry(&orchestrator),
            Command::Cancel => {
                if !orchestrator.cancel_in_flight() {
                    println!("No request in flight.");
                }
            }
            Command::Reset => orchestrator.reset().await,
            Command::Quit => break,
            Command::Unknown(cmd) => println!("Unknown command {cmd}. {HELP}"),
        }
    }

    orchestrator.cancel_in_flight();
    orchestrator.flush().await;
    render.abort();
    Ok(())
}
