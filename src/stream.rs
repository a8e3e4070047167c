//! Chat stream decoding
//!
//! Turns the chunked `data: ...` body of a `/chat/stream` response into
//! typed [`StreamEvent`]s.

mod decoder;
mod event;
mod frame;

#[cfg(test)]
mod proptests;

pub use decoder::StreamDecoder;
pub use event::StreamEvent;

use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

struct DecodeState<S> {
    /// Dropped as soon as a terminal event is produced
    source: Option<Pin<Box<S>>>,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
}

/// Decode a live byte source into a lazy, one-pass sequence of events.
///
/// The returned stream yields exactly one terminal event and then ends.
/// The source is dropped right after the terminal event, which cancels
/// the underlying read for sources that support it (e.g. a `reqwest`
/// body stream).
pub fn decode_stream<S, B, E>(source: S) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        source: Some(Box::pin(source)),
        decoder: StreamDecoder::new(),
        pending: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }

            let source = state.source.as_mut()?;
            match source.next().await {
                Some(Ok(chunk)) => state.pending.extend(state.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Chat stream read failed");
                    state.pending.extend(state.decoder.fail(e.to_string()));
                }
                None => state.pending.extend(state.decoder.finish()),
            }

            if state.decoder.is_finished() {
                state.source = None;
            }
        }
    })
}
