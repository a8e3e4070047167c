//! Incremental line-frame decoder

use super::event::StreamEvent;
use super::frame::{Frame, DATA_PREFIX, DONE_SENTINEL};

/// Message used when the source ends in the middle of a frame
pub const UNEXPECTED_END: &str = "stream ended unexpectedly";

/// Push-based decoder for the chat stream body.
///
/// Bytes are buffered and split on `\n` before any UTF-8 decoding, so a
/// chunk boundary may fall anywhere: inside a line, inside a JSON
/// payload, or inside a multi-byte character. Once a terminal event has
/// been returned, every further call is a no-op.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event has already been produced
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed the next chunk and return the events completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let newline = self.scanned + offset;
            let mut line = &self.buffer[start..newline];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            start = newline + 1;
            self.scanned = start;

            self.decode_line(&line, &mut events);
            if self.finished {
                self.buffer.clear();
                self.scanned = 0;
                return events;
            }
        }

        // Consumed lines leave the buffer in a single shift
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        events
    }

    /// Signal end of source. Returns the terminal event unless one was already produced.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;

        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.scanned = 0;
        let rest = rest.trim();

        if rest.is_empty() || rest.strip_prefix(DATA_PREFIX) == Some(DONE_SENTINEL) {
            Some(StreamEvent::Completed)
        } else {
            tracing::warn!(leftover_len = rest.len(), "Chat stream ended mid-frame");
            Some(StreamEvent::StreamError {
                message: UNEXPECTED_END.to_string(),
            })
        }
    }

    /// Signal a transport failure. Returns the terminal event unless one was already produced.
    pub fn fail(&mut self, message: impl Into<String>) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
        Some(StreamEvent::StreamError {
            message: message.into(),
        })
    }

    fn decode_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        match Frame::parse(line) {
            Frame::Skip => {}
            Frame::Done => {
                self.finished = true;
                events.push(StreamEvent::Completed);
            }
            Frame::Chunk(record) if record.is_error() => {
                tracing::debug!(message_id = ?record.message_id, "Stream reported an error");
                self.finished = true;
                events.push(StreamEvent::StreamError {
                    message: record.chunk,
                });
            }
            Frame::Chunk(record) => {
                let artifact_ids = record.announced_artifacts().map(<[String]>::to_vec);
                events.push(StreamEvent::ContentDelta { text: record.chunk });
                if let Some(artifact_ids) = artifact_ids {
                    events.push(StreamEvent::ArtifactsReady { artifact_ids });
                }
            }
        }
    }
}
