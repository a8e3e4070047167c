//! Line-oriented console front end
//!
//! Turns input lines into session actions and renders view notifications
//! as plain text.

use crate::artifact::{save_download, CodeArtifact};
use crate::client::{ChatBackend, ClientError};
use crate::preview::{generate_preview_html, write_preview};
use crate::runtime::{SessionError, SessionHandle};
use crate::state_machine::{ConnectionStatus, ConversationState, Panel, ViewEvent};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

pub const HELP: &str = "Commands: /clear, /artifacts, /preview [id...], /save [id], /status, /quit";

/// Shown as the session error when a download fails
pub const DOWNLOAD_FAILED: &str = "Failed to download artifacts";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Submit(String),
    Clear,
    Artifacts,
    /// Empty means every previewable artifact
    Preview(Vec<String>),
    /// `None` means every loaded artifact
    Save(Option<String>),
    Status,
    Quit,
    /// Blank line
    Nothing,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("No loaded artifact with id {0}")]
    UnknownArtifact(String),
    #[error("No previewable artifacts loaded")]
    NothingToPreview,
    #[error("No artifacts loaded")]
    NothingToSave,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ConsoleCommand::Nothing);
    }

    let mut words = trimmed.split_whitespace();
    let command = match words.next() {
        Some("/clear") => ConsoleCommand::Clear,
        Some("/artifacts") => ConsoleCommand::Artifacts,
        Some("/preview") => ConsoleCommand::Preview(words.map(str::to_string).collect()),
        Some("/save") => match (words.next(), words.next()) {
            (id, None) => ConsoleCommand::Save(id.map(str::to_string)),
            _ => return Err(ConsoleError::Usage("/save [artifact id]")),
        },
        Some("/status") => ConsoleCommand::Status,
        Some("/quit" | "/exit") => ConsoleCommand::Quit,
        _ => ConsoleCommand::Submit(line.trim_end_matches(['\r', '\n']).to_string()),
    };
    Ok(command)
}

/// What the input loop should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue(Option<String>),
    Quit,
}

/// Executes console commands against a session
pub struct Console<B: ChatBackend> {
    handle: SessionHandle,
    backend: Arc<B>,
    output_dir: PathBuf,
}

impl<B: ChatBackend> Console<B> {
    pub fn new(handle: SessionHandle, backend: Arc<B>, output_dir: PathBuf) -> Self {
        Self {
            handle,
            backend,
            output_dir,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn into_handle(self) -> SessionHandle {
        self.handle
    }

    pub async fn execute(&self, command: ConsoleCommand) -> Result<Outcome, ConsoleError> {
        let message = match command {
            ConsoleCommand::Nothing => None,
            ConsoleCommand::Quit => return Ok(Outcome::Quit),
            ConsoleCommand::Submit(text) => {
                self.handle.submit(text).await?;
                None
            }
            ConsoleCommand::Clear => {
                self.handle.clear().await?;
                None
            }
            ConsoleCommand::Artifacts => {
                let state = self.handle.state();
                if !state.panels.show_artifacts {
                    self.handle.toggle_panel(Panel::Artifacts).await?;
                }
                Some(describe_artifacts(&state))
            }
            ConsoleCommand::Preview(ids) => Some(self.preview(ids).await?),
            ConsoleCommand::Save(Some(id)) => Some(self.save(&id).await?),
            ConsoleCommand::Save(None) => Some(self.save_all().await?),
            ConsoleCommand::Status => Some(describe_status(&self.handle.state())),
        };
        Ok(Outcome::Continue(message))
    }

    async fn preview(&self, ids: Vec<String>) -> Result<String, ConsoleError> {
        let ids = if ids.is_empty() {
            self.handle
                .state()
                .loaded_artifacts()
                .into_iter()
                .filter(|a| a.is_previewable())
                .map(|a| a.id.clone())
                .collect()
        } else {
            ids
        };
        if ids.is_empty() {
            return Err(ConsoleError::NothingToPreview);
        }

        self.handle.show_preview(ids).await.map_err(|e| match e {
            SessionError::Rejected(_) => ConsoleError::NothingToPreview,
            SessionError::Closed => ConsoleError::Session(e),
        })?;

        let state = self.handle.state();
        let selected = state.preview_artifacts();
        let document = generate_preview_html(&selected);
        let path = write_preview(&self.output_dir, &document).await?;
        Ok(format!(
            "Preview of {} artifact(s) written to {}",
            selected.len(),
            path.display()
        ))
    }

    async fn save(&self, artifact_id: &str) -> Result<String, ConsoleError> {
        let state = self.handle.state();
        let artifact = state
            .artifacts
            .get(artifact_id)
            .ok_or_else(|| ConsoleError::UnknownArtifact(artifact_id.to_string()))?;

        let path = self.download(artifact).await?;
        Ok(format!("Saved {}", path.display()))
    }

    /// Download every loaded artifact in order, stopping at the first failure
    async fn save_all(&self) -> Result<String, ConsoleError> {
        let state = self.handle.state();
        let artifacts = state.loaded_artifacts();
        if artifacts.is_empty() {
            return Err(ConsoleError::NothingToSave);
        }

        for artifact in &artifacts {
            self.download(artifact).await?;
        }
        Ok(format!(
            "Saved {} artifact(s) to {}",
            artifacts.len(),
            self.output_dir.display()
        ))
    }

    /// Fetch and write one artifact; a failure also becomes the session error
    async fn download(&self, artifact: &CodeArtifact) -> Result<PathBuf, ConsoleError> {
        let written = match self.backend.download_artifact(&artifact.id).await {
            Ok(bytes) => save_download(&self.output_dir, artifact, &bytes)
                .await
                .map_err(ConsoleError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &written {
            tracing::warn!(artifact_id = %artifact.id, error = %e, "Failed to download artifact");
            self.handle.set_error(Some(DOWNLOAD_FAILED.to_string())).await?;
        }
        written
    }
}

pub fn describe_artifacts(state: &ConversationState) -> String {
    let artifacts = state.loaded_artifacts();
    if artifacts.is_empty() {
        return "No artifacts yet".to_string();
    }
    let mut out = format!("{} artifact(s):", artifacts.len());
    for artifact in artifacts {
        let marker = if artifact.is_previewable() { " [preview]" } else { "" };
        out.push_str(&format!(
            "\n  {}  {} ({}){marker}",
            artifact.id, artifact.title, artifact.language
        ));
    }
    out
}

pub fn describe_status(state: &ConversationState) -> String {
    let connection = match state.status {
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Disconnected => "disconnected",
    };
    let phase = if state.is_streaming() { "streaming" } else { "idle" };
    let mut out = format!(
        "Session {} | {connection} | {phase} | {} message(s), {} artifact(s)",
        state.session_id,
        state.messages.len(),
        state.artifacts.len()
    );
    if let Some(error) = &state.last_error {
        out.push_str(&format!("\nLast error: {error}"));
    }
    out
}

/// Text for a view notification, if it shows anything
pub fn render_view_event(event: &ViewEvent) -> Option<String> {
    match event {
        ViewEvent::MessageAdded { .. } => None,
        ViewEvent::StreamStarted { .. } => Some("assistant> ".to_string()),
        ViewEvent::Delta { text, .. } => Some(text.clone()),
        ViewEvent::MessageCompleted { .. } => Some("\n".to_string()),
        ViewEvent::MessageDiscarded { .. } => Some("\n[reply discarded]\n".to_string()),
        ViewEvent::ArtifactLoaded { artifact_id, .. } => Some(format!("[artifact {artifact_id} ready]\n")),
        ViewEvent::PanelChanged { panel, visible } => {
            let name = match panel {
                Panel::Artifacts => "artifacts",
                Panel::Preview => "preview",
            };
            let verb = if *visible { "opened" } else { "closed" };
            Some(format!("[{name} panel {verb}]\n"))
        }
        ViewEvent::StatusChanged { status } => Some(match status {
            ConnectionStatus::Connected => "[connected]\n".to_string(),
            ConnectionStatus::Disconnected => "[disconnected]\n".to_string(),
        }),
        ViewEvent::Error { message } => message.as_ref().map(|m| format!("error: {m}\n")),
        ViewEvent::Cleared { session_id } => Some(format!("[new session {session_id}]\n")),
    }
}

/// Write view notifications to `out` until the session goes away
pub async fn render_views<W>(views: broadcast::Receiver<ViewEvent>, mut out: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut events = BroadcastStream::new(views);
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                if let Some(text) = render_view_event(&event) {
                    out.write_all(text.as_bytes()).await?;
                    out.flush().await?;
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "View renderer fell behind");
            }
        }
    }
    Ok(())
}
