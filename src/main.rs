//! Support chat - terminal client for the support assistant backend
//!
//! Drives a multi-turn conversation with request cancellation, automatic
//! recovery and a local snapshot of the last session.

mod cli;
mod config;
mod db;
mod projector;
mod runtime;
mod transport;

use config::ChatConfig;
use db::Database;
use runtime::{DatabaseSnapshots, DispatchSettings, SessionOrchestrator};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{HttpChatApi, LoggingChatApi};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout belongs to the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "support_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = ChatConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening snapshot store");
    let db = Database::open(&config.db_path)?;

    tracing::info!(base_url = %config.base_url, "Using chat backend");
    let api = LoggingChatApi::new(HttpChatApi::new(&config.base_url)?);

    let orchestrator = SessionOrchestrator::hydrate(
        api,
        DatabaseSnapshots::new(db),
        DispatchSettings::from(&config),
    )
    .await;

    cli::run(Arc::new(orchestrator)).await?;

    tracing::info!("Chat client stopped");
    Ok(())
}
