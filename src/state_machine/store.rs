//! Owned conversation state with one method per user or stream action

use super::state::{ConnectionStatus, ConversationState, Panel, SessionId};
use super::transition::{transition, TransitionError};
use super::{Effect, Event};
use crate::artifact::CodeArtifact;

/// The single authoritative conversation state of a session.
///
/// Every mutation goes through [`ConversationStore::dispatch`], which runs
/// the pure transition and swaps the state only on success. Rejected and
/// stale events leave the state untouched.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    state: ConversationState,
}

impl ConversationStore {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            state: ConversationState::new(session_id),
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Apply an event and return the effects the caller must execute
    pub fn dispatch(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let tagged = event.message_id().map(str::to_owned);
        match transition(&self.state, event) {
            Ok(result) => {
                self.state = result.new_state;
                Ok(result.effects)
            }
            Err(e) if e.is_silent() => {
                tracing::debug!(
                    session_id = %self.state.session_id,
                    message_id = ?tagged,
                    reason = %e,
                    "Dropped event"
                );
                Err(e)
            }
            Err(e) => {
                tracing::info!(session_id = %self.state.session_id, reason = %e, "Rejected event");
                Err(e)
            }
        }
    }
}

/// One method per conversation operation
#[allow(dead_code)] // API completeness; the runtime dispatches events directly
impl ConversationStore {
    /// Like `dispatch`, but treats every rejection as a no-op
    fn apply(&mut self, event: Event) -> Vec<Effect> {
        self.dispatch(event).unwrap_or_default()
    }

    pub fn submit(&mut self, text: impl Into<String>) -> Result<Vec<Effect>, TransitionError> {
        self.dispatch(Event::submit(text))
    }

    pub fn on_content_delta(&mut self, message_id: &str, text: impl Into<String>) -> Vec<Effect> {
        self.apply(Event::ContentDelta {
            message_id: message_id.to_string(),
            text: text.into(),
        })
    }

    pub fn on_artifacts_ready(&mut self, message_id: &str, artifact_ids: Vec<String>) -> Vec<Effect> {
        self.apply(Event::ArtifactsReady {
            message_id: message_id.to_string(),
            artifact_ids,
        })
    }

    pub fn on_artifact_fetched(&mut self, message_id: &str, artifact: CodeArtifact) -> Vec<Effect> {
        self.apply(Event::ArtifactFetched {
            message_id: message_id.to_string(),
            artifact,
        })
    }

    pub fn on_completed(&mut self, message_id: &str) -> Vec<Effect> {
        self.apply(Event::StreamCompleted {
            message_id: message_id.to_string(),
        })
    }

    pub fn on_error(&mut self, message_id: &str, message: impl Into<String>) -> Vec<Effect> {
        self.apply(Event::StreamFailed {
            message_id: message_id.to_string(),
            message: message.into(),
        })
    }

    pub fn clear(&mut self) -> Vec<Effect> {
        self.apply(Event::clear())
    }

    pub fn set_connection_status(&mut self, connected: bool) -> Vec<Effect> {
        let status = if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };
        self.apply(Event::SetConnectionStatus { status })
    }

    pub fn set_error(&mut self, message: Option<String>) -> Vec<Effect> {
        self.apply(Event::SetError { message })
    }

    pub fn health_checked(&mut self, healthy: bool) -> Vec<Effect> {
        self.apply(Event::HealthChecked { healthy })
    }

    pub fn toggle_panel(&mut self, panel: Panel) -> Vec<Effect> {
        self.apply(Event::TogglePanel { panel })
    }

    pub fn show_preview(&mut self, artifact_ids: Vec<String>) -> Vec<Effect> {
        self.apply(Event::ShowPreview { artifact_ids })
    }
}
