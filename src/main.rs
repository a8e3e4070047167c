//! artifact-chat - streaming chat client for a code-generating assistant
//!
//! Sends console input to the chat backend, renders the streamed reply
//! and keeps track of the code artifacts it produces.

mod artifact;
mod client;
mod config;
mod console;
mod preview;
mod runtime;
mod state_machine;
mod stream;

use client::HttpBackend;
use config::ClientConfig;
use console::{parse_command, render_views, Console, Outcome};
use runtime::{RuntimeOptions, SessionRuntime};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artifact_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(
        api_url = %config.api_url,
        output_dir = %config.output_dir.display(),
        "Configuration loaded"
    );

    let backend = Arc::new(HttpBackend::new(&config)?);
    let handle = SessionRuntime::spawn(
        backend.clone(),
        RuntimeOptions {
            health_interval: config.health_interval,
        },
    );
    let console = Console::new(handle, backend, config.output_dir.clone());

    let renderer = tokio::spawn(render_views(console.handle().subscribe(), tokio::io::stdout()));

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("Session {}\n{}\n", console.handle().state().session_id, console::HELP).as_bytes())
        .await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let result = match parse_command(&line) {
            Ok(command) => console.execute(command).await,
            Err(e) => Err(e),
        };
        let text = match result {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Continue(None)) => continue,
            Ok(Outcome::Continue(Some(message))) => message,
            Err(e) => format!("error: {e}"),
        };
        stdout.write_all(format!("{text}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    console.into_handle().shutdown().await;
    renderer.abort();
    Ok(())
}
