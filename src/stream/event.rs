//! Events produced by the stream decoder

/// A typed event decoded from the chat stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment to append to the in-flight message
    ContentDelta { text: String },
    /// Artifact references the caller should fetch
    ArtifactsReady { artifact_ids: Vec<String> },
    /// Terminal: the stream closed normally
    Completed,
    /// Terminal: the stream aborted abnormally
    StreamError { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed | StreamEvent::StreamError { .. })
    }
}
