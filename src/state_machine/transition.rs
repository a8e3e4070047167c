//! Pure state transition function
//!
//! Given the same state and event, `transition` always produces the same
//! new state and effects. It performs no I/O; ids and timestamps arrive on
//! the event.

use super::effect::ViewEvent;
use super::state::{ChatMessage, ConnectionStatus, ConversationState, Panel, CONNECTION_LOST_MESSAGE};
use super::{Effect, Event};
use crate::artifact::CodeArtifact;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Reasons an event leaves the state unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A reply is still streaming, wait for it to finish")]
    Busy,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Event for message {message_id} is no longer addressable")]
    Stale { message_id: String },
    #[error("Ignored: {0}")]
    Ignored(&'static str),
}

impl TransitionError {
    /// Stale and ignored events are dropped quietly; the rest are user-facing rejections
    pub fn is_silent(&self) -> bool {
        matches!(self, TransitionError::Stale { .. } | TransitionError::Ignored(_))
    }
}

fn stale(message_id: String) -> TransitionError {
    TransitionError::Stale { message_id }
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // User actions
        // ============================================================
        Event::Submit {
            text,
            user_message_id,
            assistant_message_id,
            at,
        } => submit(state, text, user_message_id, assistant_message_id, at),

        Event::Clear { session_id } => {
            let mut new_state = ConversationState::new(session_id.clone());
            new_state.status = state.status;

            let abandon = state.in_flight_id().map(|id| Effect::AbandonStream {
                message_id: id.to_string(),
            });

            Ok(TransitionResult::new(new_state)
                .with_effects(abandon)
                .with_effect(Effect::notify(ViewEvent::Cleared { session_id })))
        }

        Event::TogglePanel { panel } => {
            let mut new_state = state.clone();
            let flag = match panel {
                Panel::Artifacts => &mut new_state.panels.show_artifacts,
                Panel::Preview => &mut new_state.panels.show_preview,
            };
            *flag = !*flag;
            let visible = *flag;
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify(ViewEvent::PanelChanged { panel, visible })))
        }

        Event::ShowPreview { artifact_ids } => {
            let mut selected: Vec<String> = Vec::new();
            for id in artifact_ids {
                if state.artifacts.contains_key(&id) && !selected.contains(&id) {
                    selected.push(id);
                }
            }
            if selected.is_empty() {
                return Err(TransitionError::Ignored("no loaded artifacts to preview"));
            }

            let mut new_state = state.clone();
            new_state.panels.preview_artifact_ids = selected;
            new_state.panels.show_preview = true;
            Ok(TransitionResult::new(new_state).with_effect(Effect::notify(
                ViewEvent::PanelChanged {
                    panel: Panel::Preview,
                    visible: true,
                },
            )))
        }

        // ============================================================
        // Stream events, only for the current in-flight message
        // ============================================================
        Event::ContentDelta { message_id, text } => {
            if state.in_flight_id() != Some(message_id.as_str()) {
                return Err(stale(message_id));
            }
            let mut new_state = state.clone();
            if let Some(in_flight) = new_state.in_flight.as_mut() {
                in_flight.content.push_str(&text);
            }
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify(ViewEvent::Delta { message_id, text })))
        }

        Event::StreamCompleted { message_id } => {
            if state.in_flight_id() != Some(message_id.as_str()) {
                return Err(stale(message_id));
            }
            let mut new_state = state.clone();
            let Some(message) = new_state.in_flight.take() else {
                return Err(stale(message_id));
            };
            new_state.messages.push(message.clone());
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify(ViewEvent::MessageCompleted { message })))
        }

        Event::StreamFailed {
            message_id,
            message,
        } => {
            if state.in_flight_id() != Some(message_id.as_str()) {
                return Err(stale(message_id));
            }
            let mut new_state = state.clone();
            new_state.in_flight = None;
            new_state.last_error = Some(message.clone());
            forget_artifacts(&mut new_state, &message_id);
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify(ViewEvent::MessageDiscarded { message_id }))
                .with_effect(Effect::notify_error(Some(message))))
        }

        // ============================================================
        // Artifacts, valid while the message is still addressable
        // ============================================================
        Event::ArtifactsReady {
            message_id,
            artifact_ids,
        } => artifacts_ready(state, message_id, artifact_ids),

        Event::ArtifactFetched {
            message_id,
            artifact,
        } => artifact_fetched(state, message_id, artifact),

        // ============================================================
        // Status, independent of the phase
        // ============================================================
        Event::SetConnectionStatus { status } => {
            let mut new_state = state.clone();
            new_state.status = status;
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify(ViewEvent::StatusChanged { status })))
        }

        Event::SetError { message } => {
            let mut new_state = state.clone();
            new_state.last_error.clone_from(&message);
            Ok(TransitionResult::new(new_state).with_effect(Effect::notify_error(message)))
        }

        Event::HealthChecked { healthy } => health_checked(state, healthy),
    }
}

fn submit(
    state: &ConversationState,
    text: String,
    user_message_id: String,
    assistant_message_id: String,
    at: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    if state.is_streaming() {
        return Err(TransitionError::Busy);
    }
    if text.trim().is_empty() {
        return Err(TransitionError::EmptyMessage);
    }

    let user_message = ChatMessage::user(user_message_id, text.clone(), at);
    let mut new_state = state.clone();
    new_state.messages.push(user_message.clone());
    new_state.in_flight = Some(ChatMessage::assistant(assistant_message_id.clone(), at));
    let had_error = new_state.last_error.take().is_some();
    let session_id = new_state.session_id.clone();

    let result = TransitionResult::new(new_state)
        .with_effect(Effect::notify(ViewEvent::MessageAdded {
            message: user_message,
        }))
        .with_effect(Effect::notify(ViewEvent::StreamStarted {
            message_id: assistant_message_id.clone(),
        }))
        .with_effects(had_error.then_some(Effect::notify_error(None)))
        .with_effect(Effect::OpenStream {
            session_id,
            message_id: assistant_message_id,
            text,
        });
    Ok(result)
}

fn artifacts_ready(
    state: &ConversationState,
    message_id: String,
    artifact_ids: Vec<String>,
) -> Result<TransitionResult, TransitionError> {
    // A committed message only takes announcements until the next submit
    let superseded = state.in_flight_id().is_some_and(|current| current != message_id);
    if superseded || !state.is_addressable(&message_id) {
        return Err(stale(message_id));
    }

    let mut new_state = state.clone();
    let recorded = new_state
        .artifacts_by_message_id
        .entry(message_id.clone())
        .or_default();
    let mut added = Vec::new();
    for id in artifact_ids {
        if !recorded.contains(&id) {
            recorded.push(id.clone());
            added.push(id);
        }
    }

    if added.is_empty() {
        return Err(TransitionError::Ignored("no new artifact ids"));
    }

    Ok(TransitionResult::new(new_state).with_effect(Effect::FetchArtifacts {
        message_id,
        artifact_ids: added,
    }))
}

fn artifact_fetched(
    state: &ConversationState,
    message_id: String,
    artifact: CodeArtifact,
) -> Result<TransitionResult, TransitionError> {
    let listed = state
        .artifacts_by_message_id
        .get(&message_id)
        .is_some_and(|ids| ids.contains(&artifact.id));
    if !state.is_addressable(&message_id) || !listed {
        return Err(stale(message_id));
    }

    let mut new_state = state.clone();
    let artifact_id = artifact.id.clone();
    new_state.artifacts.insert(artifact_id.clone(), artifact);

    let mut result = TransitionResult::new(new_state);
    if !state.panels.show_artifacts {
        result.new_state.panels.show_artifacts = true;
        result = result.with_effect(Effect::notify(ViewEvent::PanelChanged {
            panel: Panel::Artifacts,
            visible: true,
        }));
    }
    Ok(result.with_effect(Effect::notify(ViewEvent::ArtifactLoaded {
        message_id,
        artifact_id,
    })))
}

/// Drop everything announced for a discarded message
fn forget_artifacts(state: &mut ConversationState, message_id: &str) {
    if state.artifacts_by_message_id.remove(message_id).is_none() {
        return;
    }
    let still_listed = |id: &String, by_message: &HashMap<String, Vec<String>>| {
        by_message.values().any(|ids| ids.contains(id))
    };
    let by_message = &state.artifacts_by_message_id;
    state.artifacts.retain(|id, _| still_listed(id, by_message));
    let artifacts = &state.artifacts;
    state
        .panels
        .preview_artifact_ids
        .retain(|id| artifacts.contains_key(id));
}

fn health_checked(
    state: &ConversationState,
    healthy: bool,
) -> Result<TransitionResult, TransitionError> {
    let mut new_state = state.clone();
    let mut effects = Vec::new();

    let status = if healthy {
        ConnectionStatus::Connected
    } else {
        ConnectionStatus::Disconnected
    };
    if status != state.status {
        new_state.status = status;
        effects.push(Effect::notify(ViewEvent::StatusChanged { status }));
    }

    if healthy {
        // Only the advisory belongs to the health check; stream errors stay visible
        if state.last_error.as_deref() == Some(CONNECTION_LOST_MESSAGE) {
            new_state.last_error = None;
            effects.push(Effect::notify_error(None));
        }
    } else if state.last_error.as_deref() != Some(CONNECTION_LOST_MESSAGE) {
        new_state.last_error = Some(CONNECTION_LOST_MESSAGE.to_string());
        effects.push(Effect::notify_error(Some(CONNECTION_LOST_MESSAGE.to_string())));
    }

    Ok(TransitionResult::new(new_state).with_effects(effects))
}
