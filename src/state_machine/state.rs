//! Conversation state types

use crate::artifact::CodeArtifact;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Advisory shown while the backend cannot be reached
pub const CONNECTION_LOST_MESSAGE: &str =
    "Unable to connect to the AI service. Please check your connection.";

// ============================================================================
// Messages
// ============================================================================

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    /// Empty assistant message, the staging copy for a streamed reply
    pub fn assistant(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
            timestamp,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Opaque client-generated session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// `session_<unix millis>_<9 random lowercase alphanumerics>`
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        Self(format!("session_{}_{suffix}", Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Backend reachability as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Disconnected,
}

/// Conversation phase, derived from the presence of an in-flight message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Streaming,
}

/// Side panels the view can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Artifacts,
    Preview,
}

/// Panel visibility and live-preview selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PanelState {
    pub show_artifacts: bool,
    pub show_preview: bool,
    /// Loaded artifacts selected for the live preview, in display order
    pub preview_artifact_ids: Vec<String>,
}

/// Render-ready state of one chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: SessionId,
    /// Committed history, append-only within a session
    pub messages: Vec<ChatMessage>,
    /// The assistant message currently being streamed
    pub in_flight: Option<ChatMessage>,
    /// Artifact ids announced for each message, in announcement order
    pub artifacts_by_message_id: HashMap<String, Vec<String>>,
    /// Fetched artifact records keyed by artifact id
    pub artifacts: HashMap<String, CodeArtifact>,
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    pub panels: PanelState,
}

impl ConversationState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            in_flight: None,
            artifacts_by_message_id: HashMap::new(),
            artifacts: HashMap::new(),
            status: ConnectionStatus::default(),
            last_error: None,
            panels: PanelState::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::Streaming
        } else {
            Phase::Idle
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.phase() == Phase::Streaming
    }

    /// Id of the in-flight message, if one is streaming
    pub fn in_flight_id(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|m| m.id.as_str())
    }

    /// A message id events may still refer to: the in-flight message or a committed one
    pub fn is_addressable(&self, message_id: &str) -> bool {
        self.in_flight_id() == Some(message_id) || self.messages.iter().any(|m| m.id == message_id)
    }

    /// Loaded artifacts for a message, in announcement order
    pub fn artifacts_for(&self, message_id: &str) -> Vec<&CodeArtifact> {
        self.artifacts_by_message_id
            .get(message_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.artifacts.get(id))
            .collect()
    }

    /// All loaded artifacts of the session, in message then announcement order
    pub fn loaded_artifacts(&self) -> Vec<&CodeArtifact> {
        self.messages
            .iter()
            .map(|m| m.id.as_str())
            .chain(self.in_flight_id())
            .flat_map(|id| self.artifacts_for(id))
            .collect()
    }

    /// Artifacts currently selected for the live preview
    pub fn preview_artifacts(&self) -> Vec<&CodeArtifact> {
        self.panels
            .preview_artifact_ids
            .iter()
            .filter_map(|id| self.artifacts.get(id))
            .collect()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(SessionId::generate())
    }
}
