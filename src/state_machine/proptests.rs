//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary interleavings
//! of user actions, stream events and late artifact fetches.

#![allow(clippy::needless_pass_by_value)]

use super::transition::{transition, TransitionResult};
use super::*;
use crate::artifact::{ArtifactType, CodeArtifact};
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Test Helpers
// ============================================================================

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn test_artifact(id: &str, message_id: &str) -> CodeArtifact {
    CodeArtifact {
        id: id.to_string(),
        title: format!("artifact {id}"),
        description: None,
        artifact_type: ArtifactType::Code,
        language: "python".into(),
        content: "print('hi')".into(),
        session_id: "session_test".into(),
        message_id: message_id.into(),
        created_at: epoch(),
        metadata: None,
        is_runnable: false,
        preview_url: None,
    }
}

/// Which message a stream or fetch event is tagged with
#[derive(Debug, Clone)]
enum Target {
    /// The message currently streaming, if any
    Current,
    /// A committed message, picked by index
    Committed(usize),
    /// A message that never existed in this session
    Unknown,
}

impl Target {
    fn resolve(&self, state: &ConversationState) -> String {
        match self {
            Target::Current => state.in_flight_id().unwrap_or("assistant_none").to_string(),
            Target::Committed(n) if !state.messages.is_empty() => {
                state.messages[n % state.messages.len()].id.clone()
            }
            Target::Committed(_) | Target::Unknown => "assistant_unknown".to_string(),
        }
    }
}

/// Event template, turned into a concrete `Event` against the current state
#[derive(Debug, Clone)]
enum Step {
    Submit(String),
    Delta(Target, String),
    Artifacts(Target, Vec<String>),
    Fetched(Target, String),
    Completed(Target),
    Failed(Target, String),
    Clear,
    Health(bool),
    Toggle(Panel),
    Preview(Vec<String>),
}

impl Step {
    fn materialize(&self, state: &ConversationState, step: usize) -> Event {
        match self {
            Step::Submit(text) => Event::Submit {
                text: text.clone(),
                user_message_id: format!("user_{step}"),
                assistant_message_id: format!("assistant_{step}"),
                at: epoch(),
            },
            Step::Delta(target, text) => Event::ContentDelta {
                message_id: target.resolve(state),
                text: text.clone(),
            },
            Step::Artifacts(target, ids) => Event::ArtifactsReady {
                message_id: target.resolve(state),
                artifact_ids: ids.clone(),
            },
            Step::Fetched(target, id) => {
                let message_id = target.resolve(state);
                Event::ArtifactFetched {
                    artifact: test_artifact(id, &message_id),
                    message_id,
                }
            }
            Step::Completed(target) => Event::StreamCompleted {
                message_id: target.resolve(state),
            },
            Step::Failed(target, message) => Event::StreamFailed {
                message_id: target.resolve(state),
                message: message.clone(),
            },
            Step::Clear => Event::Clear {
                session_id: SessionId::from(format!("session_{step}").as_str()),
            },
            Step::Health(healthy) => Event::HealthChecked { healthy: *healthy },
            Step::Toggle(panel) => Event::TogglePanel { panel: *panel },
            Step::Preview(ids) => Event::ShowPreview {
                artifact_ids: ids.clone(),
            },
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_target() -> impl Strategy<Value = Target> {
    prop_oneof![
        4 => Just(Target::Current),
        2 => (0usize..8).prop_map(Target::Committed),
        1 => Just(Target::Unknown),
    ]
}

fn arb_artifact_id() -> impl Strategy<Value = String> {
    "a[0-4]"
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => "[a-zA-Z ]{0,12}".prop_map(Step::Submit),
        6 => (arb_target(), "[a-zA-Z ]{0,8}").prop_map(|(t, s)| Step::Delta(t, s)),
        2 => (arb_target(), proptest::collection::vec(arb_artifact_id(), 0..3))
            .prop_map(|(t, ids)| Step::Artifacts(t, ids)),
        2 => (arb_target(), arb_artifact_id()).prop_map(|(t, id)| Step::Fetched(t, id)),
        3 => arb_target().prop_map(Step::Completed),
        1 => (arb_target(), "[a-z ]{1,12}").prop_map(|(t, m)| Step::Failed(t, m)),
        1 => Just(Step::Clear),
        1 => any::<bool>().prop_map(Step::Health),
        1 => prop_oneof![Just(Panel::Artifacts), Just(Panel::Preview)].prop_map(Step::Toggle),
        1 => proptest::collection::vec(arb_artifact_id(), 0..3).prop_map(Step::Preview),
    ]
}

// ============================================================================
// Invariant Checks
// ============================================================================

fn check_invariants(state: &ConversationState) -> Result<(), String> {
    let mut seen = HashSet::new();
    for message in &state.messages {
        if !seen.insert(message.id.as_str()) {
            return Err(format!("duplicate message id {}", message.id));
        }
    }

    if let Some(in_flight) = &state.in_flight {
        if seen.contains(in_flight.id.as_str()) {
            return Err(format!("in-flight id {} already committed", in_flight.id));
        }
        if in_flight.role != Role::Assistant {
            return Err("in-flight message is not from the assistant".into());
        }
    }

    for message_id in state.artifacts_by_message_id.keys() {
        if !state.is_addressable(message_id) {
            return Err(format!("artifacts recorded for unknown message {message_id}"));
        }
    }

    for artifact_id in state.artifacts.keys() {
        let listed = state
            .artifacts_by_message_id
            .values()
            .any(|ids| ids.contains(artifact_id));
        if !listed {
            return Err(format!("loaded artifact {artifact_id} was never announced"));
        }
    }

    for id in &state.panels.preview_artifact_ids {
        if !state.artifacts.contains_key(id) {
            return Err(format!("preview references unloaded artifact {id}"));
        }
    }

    Ok(())
}

fn run(steps: &[Step]) -> Vec<(ConversationState, Event, Result<TransitionResult, TransitionError>)> {
    let mut state = ConversationState::new(SessionId::from("session_start"));
    let mut trace = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        let event = step.materialize(&state, i);
        let result = transition(&state, event.clone());
        let next = match &result {
            Ok(r) => r.new_state.clone(),
            Err(_) => state.clone(),
        };
        trace.push((state, event, result));
        state = next;
    }
    trace
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Invariant 1: Valid state after any sequence of events
    #[test]
    fn prop_transitions_preserve_invariants(steps in proptest::collection::vec(arb_step(), 0..40)) {
        for (_, event, result) in run(&steps) {
            if let Ok(result) = result {
                if let Err(violation) = check_invariants(&result.new_state) {
                    prop_assert!(false, "{} after {:?}", violation, event);
                }
            }
        }
    }

    // Invariant 2: Submit is rejected while a reply is streaming
    #[test]
    fn prop_submit_while_streaming_is_rejected(
        steps in proptest::collection::vec(arb_step(), 0..20),
        text in "[a-z]{1,10}",
    ) {
        let trace = run(&steps);
        let state = trace
            .last()
            .map_or_else(
                || ConversationState::new(SessionId::from("session_start")),
                |(s, _, r)| r.as_ref().map_or_else(|_| s.clone(), |r| r.new_state.clone()),
            );
        let result = transition(&state, Step::Submit(text).materialize(&state, 999));
        if state.is_streaming() {
            prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    // Invariant 3: Events for messages that are not addressable never apply
    #[test]
    fn prop_stale_events_are_dropped(steps in proptest::collection::vec(arb_step(), 0..40)) {
        for (before, event, result) in run(&steps) {
            if let Some(message_id) = event.message_id() {
                let addressable = match &event {
                    Event::ContentDelta { .. }
                    | Event::StreamCompleted { .. }
                    | Event::StreamFailed { .. } => before.in_flight_id() == Some(message_id),
                    Event::ArtifactsReady { .. } => {
                        before.in_flight_id().map_or(before.is_addressable(message_id), |id| id == message_id)
                    }
                    _ => before.is_addressable(message_id),
                };
                if !addressable {
                    prop_assert!(
                        matches!(result, Err(TransitionError::Stale { .. })),
                        "stale {:?} was applied", event
                    );
                }
            }
        }
    }

    // Invariant 4: Completion commits exactly the streamed content under the original id
    #[test]
    fn prop_completion_commits_streamed_content(
        deltas in proptest::collection::vec("[a-zA-Z ]{0,8}", 0..10),
    ) {
        let mut state = ConversationState::new(SessionId::from("session_start"));
        state = transition(&state, Step::Submit("go".into()).materialize(&state, 0)).unwrap().new_state;
        let id = state.in_flight_id().unwrap().to_string();

        for text in &deltas {
            state = transition(&state, Event::ContentDelta { message_id: id.clone(), text: text.clone() })
                .unwrap()
                .new_state;
        }
        state = transition(&state, Event::StreamCompleted { message_id: id.clone() }).unwrap().new_state;

        prop_assert!(state.in_flight.is_none());
        let committed = state.messages.last().unwrap();
        prop_assert_eq!(&committed.id, &id);
        prop_assert_eq!(&committed.content, &deltas.concat());
    }

    // Invariant 5: Failure never commits the partial reply
    #[test]
    fn prop_failure_discards_in_flight(
        deltas in proptest::collection::vec("[a-z]{1,8}", 0..5),
        message in "[a-z ]{1,20}",
    ) {
        let mut state = ConversationState::new(SessionId::from("session_start"));
        state = transition(&state, Step::Submit("go".into()).materialize(&state, 0)).unwrap().new_state;
        let id = state.in_flight_id().unwrap().to_string();
        for text in deltas {
            state = transition(&state, Event::ContentDelta { message_id: id.clone(), text }).unwrap().new_state;
        }

        let committed_before = state.messages.len();
        state = transition(&state, Event::StreamFailed { message_id: id.clone(), message: message.clone() })
            .unwrap()
            .new_state;

        prop_assert!(state.in_flight.is_none());
        prop_assert_eq!(state.messages.len(), committed_before);
        prop_assert!(state.messages.iter().all(|m| m.id != id));
        prop_assert_eq!(state.last_error, Some(message));
    }

    // Invariant 6: Clear always lands in an empty idle session, keeping only the status
    #[test]
    fn prop_clear_resets_everything_but_status(steps in proptest::collection::vec(arb_step(), 0..30)) {
        for (before, _, result) in run(&steps) {
            let state = result.map_or(before, |r| r.new_state);
            let cleared = transition(&state, Event::Clear { session_id: SessionId::from("session_new") })
                .unwrap()
                .new_state;

            prop_assert!(!cleared.is_streaming());
            prop_assert!(cleared.messages.is_empty());
            prop_assert!(cleared.artifacts_by_message_id.is_empty());
            prop_assert!(cleared.artifacts.is_empty());
            prop_assert!(cleared.last_error.is_none());
            prop_assert_eq!(cleared.status, state.status);
            prop_assert_ne!(cleared.session_id, state.session_id);
        }
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_late_fetch_after_new_submit_targets_original_message() {
    let mut state = ConversationState::new(SessionId::from("session_start"));
    state = transition(&state, Step::Submit("first".into()).materialize(&state, 0))
        .unwrap()
        .new_state;
    let first = state.in_flight_id().unwrap().to_string();

    state = transition(
        &state,
        Event::ArtifactsReady {
            message_id: first.clone(),
            artifact_ids: vec!["a1".into()],
        },
    )
    .unwrap()
    .new_state;
    state = transition(
        &state,
        Event::StreamCompleted {
            message_id: first.clone(),
        },
    )
    .unwrap()
    .new_state;

    // A second exchange starts before the fetch for the first resolves
    state = transition(&state, Step::Submit("second".into()).materialize(&state, 1))
        .unwrap()
        .new_state;
    let second = state.in_flight_id().unwrap().to_string();
    assert_ne!(first, second);

    state = transition(
        &state,
        Event::ArtifactFetched {
            message_id: first.clone(),
            artifact: test_artifact("a1", &first),
        },
    )
    .unwrap()
    .new_state;

    assert_eq!(state.artifacts_for(&first).len(), 1);
    assert!(state.artifacts_for(&second).is_empty());
}

#[test]
fn test_late_fetch_after_clear_is_dropped() {
    let mut state = ConversationState::new(SessionId::from("session_start"));
    state = transition(&state, Step::Submit("first".into()).materialize(&state, 0))
        .unwrap()
        .new_state;
    let id = state.in_flight_id().unwrap().to_string();
    state = transition(
        &state,
        Event::ArtifactsReady {
            message_id: id.clone(),
            artifact_ids: vec!["a1".into()],
        },
    )
    .unwrap()
    .new_state;
    state = transition(&state, Step::Clear.materialize(&state, 1))
        .unwrap()
        .new_state;

    let result = transition(
        &state,
        Event::ArtifactFetched {
            message_id: id.clone(),
            artifact: test_artifact("a1", &id),
        },
    );
    assert_eq!(result.unwrap_err(), TransitionError::Stale { message_id: id });
}
