//! Wire format of a single `data:` frame

use serde::{Deserialize, Serialize};

/// Prefix marking a significant line
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream normally
pub const DONE_SENTINEL: &str = "[DONE]";

/// Prefix the backend puts on the text of failure chunks
const ERROR_TEXT_PREFIX: &str = "Error: ";

/// JSON payload of a `data:` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub has_artifacts: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

impl ChunkRecord {
    /// Whether this chunk carries an application-level error instead of content.
    ///
    /// The agent sets `error: true`. The endpoint-level failure chunk has no
    /// flag, but is always complete and prefixed with `Error: `.
    pub fn is_error(&self) -> bool {
        self.error == Some(true) || (self.is_complete && self.chunk.starts_with(ERROR_TEXT_PREFIX))
    }

    /// Artifact ids announced by this chunk, if any
    pub fn announced_artifacts(&self) -> Option<&[String]> {
        if !self.has_artifacts {
            return None;
        }
        self.artifacts
            .as_deref()
            .filter(|artifacts| !artifacts.is_empty())
    }
}

/// What a single complete line means
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Frame {
    /// Not a `data:` line, or a payload that failed to parse
    Skip,
    Done,
    Chunk(ChunkRecord),
}

impl Frame {
    pub(super) fn parse(line: &str) -> Self {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Frame::Skip;
        };

        if payload == DONE_SENTINEL {
            return Frame::Done;
        }

        match serde_json::from_str::<ChunkRecord>(payload) {
            Ok(record) => Frame::Chunk(record),
            Err(e) => {
                tracing::warn!(error = %e, payload_len = payload.len(), "Skipping malformed stream frame");
                Frame::Skip
            }
        }
    }
}
