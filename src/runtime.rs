//! Runtime for a live chat session
//!
//! One [`SessionRuntime`] task owns the conversation state and applies
//! every event in arrival order. Everything else (the user, the reply
//! stream, artifact fetches, the health poller) talks to it over a
//! channel and observes it through snapshots and view notifications.

mod executor;


pub use executor::SessionRuntime;

use crate::state_machine::{ConversationState, Event, Panel, TransitionError, ViewEvent};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// An event for the runtime, optionally with a channel for the outcome
#[derive(Debug)]
pub struct Command {
    pub event: Event,
    pub reply: Option<oneshot::Sender<Result<(), TransitionError>>>,
}

impl From<Event> for Command {
    fn from(event: Event) -> Self {
        Self { event, reply: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("Session runtime has stopped")]
    Closed,
}

/// Runtime knobs that are not about the backend itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// `None` disables background health checks
    pub health_interval: Option<Duration>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            health_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Handle to interact with a running session
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConversationState>,
    view_tx: broadcast::Sender<ViewEvent>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Send a user action and wait for the state machine's verdict
    async fn request(&self, event: Event) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.request(Event::submit(text)).await
    }

    pub async fn clear(&self) -> Result<(), SessionError> {
        self.request(Event::clear()).await
    }

    pub async fn toggle_panel(&self, panel: Panel) -> Result<(), SessionError> {
        self.request(Event::TogglePanel { panel }).await
    }

    pub async fn show_preview(&self, artifact_ids: Vec<String>) -> Result<(), SessionError> {
        self.request(Event::ShowPreview { artifact_ids }).await
    }

    /// Replace the user-visible error, `None` clears it
    pub async fn set_error(&self, message: Option<String>) -> Result<(), SessionError> {
        self.request(Event::SetError { message }).await
    }

    /// Current state snapshot
    pub fn state(&self) -> ConversationState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that sees every published snapshot
    #[allow(dead_code)] // Used by tests
    pub fn watch(&self) -> watch::Receiver<ConversationState> {
        self.state_rx.clone()
    }

    /// View notifications emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.view_tx.subscribe()
    }

    /// Stop the runtime and wait for it to exit
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Session runtime task failed");
        }
    }
}
