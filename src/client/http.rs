//! `reqwest` implementation of the chat backend

use super::{ChatBackend, ChatRequest, ClientError, EventStream, HealthStatus};
use crate::artifact::CodeArtifact;
use crate::config::ClientConfig;
use crate::stream::decode_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};

/// Chat backend reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Pass 2xx responses through, classify everything else
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status, &body))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<EventStream, ClientError> {
        let response = self
            .client
            .post(self.url("/chat/stream"))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response).await?;

        tracing::debug!(session_id = %request.session_id, "Chat stream opened");
        Ok(decode_stream(response.bytes_stream()).boxed())
    }

    async fn get_artifact(&self, artifact_id: &str) -> Result<CodeArtifact, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/artifacts/artifacts/{artifact_id}")))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn download_artifact(&self, artifact_id: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/artifacts/artifacts/{artifact_id}/download")))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        let response = self.client.get(self.url("/health")).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}
