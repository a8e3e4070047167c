//! Backend client error types

use thiserror::Error;

/// Backend call error with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Timeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::NotFound, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::InvalidRequest, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::ServerError, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Decode, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP response
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = detail_of(body);
        match status.as_u16() {
            404 => Self::not_found(format!("Not found: {detail}")),
            400 | 422 => Self::invalid_request(format!("Invalid request: {detail}")),
            408 | 504 => Self::timeout(format!("Timed out: {detail}")),
            500..=599 => Self::server_error(format!("Server error: {detail}")),
            _ => Self::unknown(format!("HTTP {status}: {detail}")),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() || e.is_request() {
            Self::network(format!("Connection failed: {e}"))
        } else if e.is_decode() {
            Self::decode(format!("Invalid response: {e}"))
        } else {
            Self::unknown(e.to_string())
        }
    }
}

/// Error bodies carry the human-readable reason under `detail`
fn detail_of(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Connection refused, reset, DNS failure
    Network,
    Timeout,
    /// 404
    NotFound,
    /// 400, 422
    InvalidRequest,
    /// 5xx
    ServerError,
    /// Body did not match the expected shape
    Decode,
    Unknown,
}

impl ClientErrorKind {
    /// Whether the failure means the backend could not be reached
    pub fn is_connectivity(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}
