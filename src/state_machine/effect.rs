//! Effects produced by state transitions

use super::state::{ChatMessage, ConnectionStatus, Panel, SessionId};

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the reply stream for a submitted message
    OpenStream {
        session_id: SessionId,
        message_id: String,
        text: String,
    },

    /// Best-effort cancel of the stream started for `message_id`
    AbandonStream { message_id: String },

    /// Fetch artifact records announced for a message
    FetchArtifacts {
        message_id: String,
        artifact_ids: Vec<String>,
    },

    /// Notify the view layer
    Notify(ViewEvent),
}

/// Incremental notifications for the view layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    MessageAdded { message: ChatMessage },
    StreamStarted { message_id: String },
    Delta { message_id: String, text: String },
    MessageCompleted { message: ChatMessage },
    MessageDiscarded { message_id: String },
    ArtifactLoaded { message_id: String, artifact_id: String },
    PanelChanged { panel: Panel, visible: bool },
    StatusChanged { status: ConnectionStatus },
    Error { message: Option<String> },
    Cleared { session_id: SessionId },
}

impl Effect {
    pub fn notify(event: ViewEvent) -> Self {
        Effect::Notify(event)
    }

    pub fn notify_error(message: Option<String>) -> Self {
        Effect::Notify(ViewEvent::Error { message })
    }
}
