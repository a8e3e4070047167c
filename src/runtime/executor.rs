//! Session runtime executor

use super::{Command, RuntimeOptions, SessionHandle};
use crate::client::{ChatBackend, ChatRequest};
use crate::state_machine::{ConversationState, ConversationStore, Effect, Event, SessionId, ViewEvent};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// The reply stream currently being read
struct ActiveStream {
    message_id: String,
    cancel: CancellationToken,
}

/// Owns the conversation state and executes the effects of each transition
pub struct SessionRuntime<B: ChatBackend + 'static> {
    store: ConversationStore,
    backend: Arc<B>,
    options: RuntimeOptions,
    command_rx: mpsc::Receiver<Command>,
    /// Weak so the session ends once every handle is gone
    command_tx: mpsc::WeakSender<Command>,
    state_tx: watch::Sender<ConversationState>,
    view_tx: broadcast::Sender<ViewEvent>,
    shutdown: CancellationToken,
    stream: Option<ActiveStream>,
}

impl<B: ChatBackend + 'static> SessionRuntime<B> {
    /// Start a session with a freshly generated id
    pub fn spawn(backend: Arc<B>, options: RuntimeOptions) -> SessionHandle {
        Self::spawn_with_id(backend, options, SessionId::generate())
    }

    pub fn spawn_with_id(backend: Arc<B>, options: RuntimeOptions, session_id: SessionId) -> SessionHandle {
        let store = ConversationStore::new(session_id);
        let (command_tx, command_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(store.state().clone());
        let (view_tx, _) = broadcast::channel(256);
        let shutdown = CancellationToken::new();

        let runtime = Self {
            store,
            backend,
            options,
            command_rx,
            command_tx: command_tx.downgrade(),
            state_tx,
            view_tx: view_tx.clone(),
            shutdown: shutdown.clone(),
            stream: None,
        };
        let task = tokio::spawn(runtime.run());

        SessionHandle {
            command_tx,
            state_rx,
            view_tx,
            shutdown,
            task,
        }
    }

    async fn run(mut self) {
        let session_id = self.store.state().session_id.clone();
        tracing::info!(session_id = %session_id, "Starting session runtime");

        if let Some(interval) = self.options.health_interval {
            self.spawn_health_poller(interval);
        }

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                Some(command) = self.command_rx.recv() => self.process(command),
                else => break,
            }
        }

        if let Some(stream) = self.stream.take() {
            stream.cancel.cancel();
        }
        self.shutdown.cancel();
        tracing::info!(session_id = %session_id, "Session runtime stopped");
    }

    fn process(&mut self, command: Command) {
        let outcome = self.store.dispatch(command.event).map(|effects| {
            self.state_tx.send_replace(self.store.state().clone());
            for effect in effects {
                self.execute_effect(effect);
            }
        });

        if let Some(reply) = command.reply {
            let _ = reply.send(outcome);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::OpenStream {
                session_id,
                message_id,
                text,
            } => self.open_stream(session_id, message_id, text),

            Effect::AbandonStream { message_id } => {
                if let Some(stream) = self.stream.take() {
                    if stream.message_id == message_id {
                        tracing::info!(message_id = %message_id, "Abandoning reply stream");
                        stream.cancel.cancel();
                    } else {
                        self.stream = Some(stream);
                    }
                }
            }

            Effect::FetchArtifacts {
                message_id,
                artifact_ids,
            } => self.fetch_artifacts(message_id, artifact_ids),

            Effect::Notify(view_event) => {
                // No subscribers is fine
                let _ = self.view_tx.send(view_event);
            }
        }
    }

    fn open_stream(&mut self, session_id: SessionId, message_id: String, text: String) {
        if let Some(previous) = self.stream.take() {
            previous.cancel.cancel();
        }
        let cancel = CancellationToken::new();
        self.stream = Some(ActiveStream {
            message_id: message_id.clone(),
            cancel: cancel.clone(),
        });

        let Some(command_tx) = self.command_tx.upgrade() else {
            return;
        };
        let backend = self.backend.clone();
        let request = ChatRequest::streaming(text, session_id.as_str());

        tokio::spawn(async move {
            tracing::info!(session_id = %session_id, message_id = %message_id, "Opening reply stream");

            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                opened = backend.open_stream(&request) => opened,
            };
            let mut events = match opened {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(
                        message_id = %message_id,
                        error = %e,
                        connectivity = e.kind.is_connectivity(),
                        "Failed to open reply stream"
                    );
                    let _ = command_tx
                        .send(
                            Event::StreamFailed {
                                message_id,
                                message: e.message,
                            }
                            .into(),
                        )
                        .await;
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::debug!(message_id = %message_id, "Reply stream cancelled");
                        break;
                    }
                    next = events.next() => next,
                };
                let Some(event) = next else { break };
                let terminal = event.is_terminal();
                if command_tx
                    .send(Event::from_stream(message_id.clone(), event).into())
                    .await
                    .is_err()
                    || terminal
                {
                    break;
                }
            }
        });
    }

    fn fetch_artifacts(&self, message_id: String, artifact_ids: Vec<String>) {
        let Some(command_tx) = self.command_tx.upgrade() else {
            return;
        };
        let backend = self.backend.clone();

        tokio::spawn(async move {
            let fetches = artifact_ids.iter().map(|id| backend.get_artifact(id));
            let results = futures::future::join_all(fetches).await;

            for (artifact_id, result) in artifact_ids.iter().zip(results) {
                match result {
                    Ok(artifact) => {
                        let event = Event::ArtifactFetched {
                            message_id: message_id.clone(),
                            artifact,
                        };
                        if command_tx.send(event.into()).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            message_id = %message_id,
                            artifact_id = %artifact_id,
                            error = %e,
                            "Failed to fetch artifact"
                        );
                    }
                }
            }
        });
    }

    fn spawn_health_poller(&self, period: Duration) {
        let backend = self.backend.clone();
        let command_tx = self.command_tx.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let healthy = match backend.health().await {
                    Ok(status) => {
                        tracing::debug!(status = %status.status, version = %status.version, "Health check passed");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Health check failed");
                        false
                    }
                };
                let Some(sender) = command_tx.upgrade() else {
                    break;
                };
                if sender.send(Event::HealthChecked { healthy }.into()).await.is_err() {
                    break;
                }
            }
            tracing::debug!("Health poller stopped");
        });
    }
}
