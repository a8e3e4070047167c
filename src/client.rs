//! Chat backend abstraction
//!
//! The session runtime talks to the backend only through [`ChatBackend`],
//! so tests can swap in a scripted mock.

mod error;
mod http;

pub use error::{ClientError, ClientErrorKind};
pub use http::HttpBackend;

use crate::artifact::CodeArtifact;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decoded events of one reply stream
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Body of `POST /chat/stream`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    pub stream: bool,
}

impl ChatRequest {
    pub fn streaming(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            stream: true,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api_key_configured: bool,
}

/// Operations the client needs from the chat backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a reply stream. Errors here mean the stream never opened;
    /// failures after that arrive as a terminal `StreamError` event.
    async fn open_stream(&self, request: &ChatRequest) -> Result<EventStream, ClientError>;

    async fn get_artifact(&self, artifact_id: &str) -> Result<CodeArtifact, ClientError>;

    /// Raw file contents of an artifact
    async fn download_artifact(&self, artifact_id: &str) -> Result<Vec<u8>, ClientError>;

    async fn health(&self) -> Result<HealthStatus, ClientError>;
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn open_stream(&self, request: &ChatRequest) -> Result<EventStream, ClientError> {
        (**self).open_stream(request).await
    }

    async fn get_artifact(&self, artifact_id: &str) -> Result<CodeArtifact, ClientError> {
        (**self).get_artifact(artifact_id).await
    }

    async fn download_artifact(&self, artifact_id: &str) -> Result<Vec<u8>, ClientError> {
        (**self).download_artifact(artifact_id).await
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        (**self).health().await
    }
}
