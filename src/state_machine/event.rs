//! Events that can occur in a conversation

use super::state::{ConnectionStatus, Panel, SessionId};
use crate::artifact::CodeArtifact;
use crate::stream::StreamEvent;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions.
///
/// Everything a transition needs is carried on the event (ids,
/// timestamps), so `transition` stays deterministic. Stream and fetch
/// events carry the id of the message they were started for.
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        text: String,
        user_message_id: String,
        assistant_message_id: String,
        at: DateTime<Utc>,
    },
    Clear {
        session_id: SessionId,
    },
    TogglePanel {
        panel: Panel,
    },
    ShowPreview {
        artifact_ids: Vec<String>,
    },

    // Stream events
    ContentDelta {
        message_id: String,
        text: String,
    },
    ArtifactsReady {
        message_id: String,
        artifact_ids: Vec<String>,
    },
    StreamCompleted {
        message_id: String,
    },
    StreamFailed {
        message_id: String,
        message: String,
    },

    // Fetch events
    ArtifactFetched {
        message_id: String,
        artifact: CodeArtifact,
    },

    // Status events
    SetConnectionStatus {
        status: ConnectionStatus,
    },
    SetError {
        message: Option<String>,
    },
    HealthChecked {
        healthy: bool,
    },
}

impl Event {
    /// A user message with freshly assigned ids for both sides of the exchange
    pub fn submit(text: impl Into<String>) -> Self {
        Event::Submit {
            text: text.into(),
            user_message_id: format!("user_{}", uuid::Uuid::new_v4()),
            assistant_message_id: format!("assistant_{}", uuid::Uuid::new_v4()),
            at: Utc::now(),
        }
    }

    /// Start over with a newly generated session id
    pub fn clear() -> Self {
        Event::Clear {
            session_id: SessionId::generate(),
        }
    }

    /// Tag a decoded stream event with the message it belongs to
    pub fn from_stream(message_id: impl Into<String>, event: StreamEvent) -> Self {
        let message_id = message_id.into();
        match event {
            StreamEvent::ContentDelta { text } => Event::ContentDelta { message_id, text },
            StreamEvent::ArtifactsReady { artifact_ids } => Event::ArtifactsReady {
                message_id,
                artifact_ids,
            },
            StreamEvent::Completed => Event::StreamCompleted { message_id },
            StreamEvent::StreamError { message } => Event::StreamFailed {
                message_id,
                message,
            },
        }
    }

    /// Message id the event is tagged with, for events that can go stale
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Event::ContentDelta { message_id, .. }
            | Event::ArtifactsReady { message_id, .. }
            | Event::StreamCompleted { message_id }
            | Event::StreamFailed { message_id, .. }
            | Event::ArtifactFetched { message_id, .. } => Some(message_id),
            _ => None,
        }
    }
}
