//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
mod store;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, ViewEvent};
pub use event::Event;
pub use state::{ChatMessage, ConnectionStatus, ConversationState, Panel, Role, SessionId};
pub use store::ConversationStore;
pub use transition::TransitionError;
