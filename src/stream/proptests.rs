//! Property-based tests for the stream decoder
//!
//! - Decoding is independent of how the body is split into chunks
//! - Every stream produces exactly one terminal event, and it comes last
//! - Malformed frames never disturb the frames around them

#![allow(clippy::redundant_closure_for_method_calls)]

use super::decoder::UNEXPECTED_END;
use super::frame::ChunkRecord;
use super::*;
use proptest::prelude::*;

// ============================================================================
// Body model
// ============================================================================

#[derive(Debug, Clone)]
enum BodyLine {
    Delta(String),
    WithArtifacts(String, Vec<String>),
    Malformed(String),
    Comment,
    Blank,
}

impl BodyLine {
    fn render(&self) -> String {
        match self {
            BodyLine::Delta(text) => data_line(&ChunkRecord {
                chunk: text.clone(),
                message_id: Some("m-1".into()),
                session_id: Some("s-1".into()),
                is_complete: false,
                has_artifacts: false,
                artifacts: None,
                error: None,
            }),
            BodyLine::WithArtifacts(text, ids) => data_line(&ChunkRecord {
                chunk: text.clone(),
                message_id: Some("m-1".into()),
                session_id: Some("s-1".into()),
                is_complete: true,
                has_artifacts: true,
                artifacts: Some(ids.clone()),
                error: None,
            }),
            BodyLine::Malformed(garbage) => format!("data: {{{garbage}\n"),
            BodyLine::Comment => ": keep-alive\n".to_string(),
            BodyLine::Blank => "\n".to_string(),
        }
    }

    fn expected(&self) -> Vec<StreamEvent> {
        match self {
            BodyLine::Delta(text) => vec![StreamEvent::ContentDelta { text: text.clone() }],
            BodyLine::WithArtifacts(text, ids) => {
                let mut events = vec![StreamEvent::ContentDelta { text: text.clone() }];
                if !ids.is_empty() {
                    events.push(StreamEvent::ArtifactsReady {
                        artifact_ids: ids.clone(),
                    });
                }
                events
            }
            BodyLine::Malformed(_) | BodyLine::Comment | BodyLine::Blank => vec![],
        }
    }
}

fn data_line(record: &ChunkRecord) -> String {
    format!("data: {}\n", serde_json::to_string(record).unwrap())
}

#[derive(Debug, Clone, Copy)]
enum Ending {
    Done,
    Eof,
    Truncated,
}

fn render_body(lines: &[BodyLine], ending: Ending) -> String {
    let mut body: String = lines.iter().map(BodyLine::render).collect();
    match ending {
        Ending::Done => body.push_str("data: [DONE]\n\n"),
        Ending::Eof => {}
        Ending::Truncated => body.push_str("data: {\"chunk\":\"cut"),
    }
    body
}

fn expected_events(lines: &[BodyLine], ending: Ending) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = lines.iter().flat_map(BodyLine::expected).collect();
    events.push(match ending {
        Ending::Done | Ending::Eof => StreamEvent::Completed,
        Ending::Truncated => StreamEvent::StreamError {
            message: UNEXPECTED_END.to_string(),
        },
    });
    events
}

fn decode_split(body: &[u8], cuts: &[usize]) -> Vec<StreamEvent> {
    let mut decoder = StreamDecoder::new();
    let mut events = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        events.extend(decoder.push(&body[start..cut]));
        start = cut;
    }
    events.extend(decoder.push(&body[start..]));
    events.extend(decoder.finish());
    events
}

// ============================================================================
// Strategies
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?\"\\\\{}éü✓\n\t]{0,24}"
}

fn arb_artifact_ids() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-f0-9]{8}", 0..4)
}

fn arb_line() -> impl Strategy<Value = BodyLine> {
    prop_oneof![
        4 => arb_text().prop_map(BodyLine::Delta),
        1 => (arb_text(), arb_artifact_ids()).prop_map(|(t, ids)| BodyLine::WithArtifacts(t, ids)),
        1 => "[a-z: ]{0,12}".prop_map(BodyLine::Malformed),
        1 => Just(BodyLine::Comment),
        1 => Just(BodyLine::Blank),
    ]
}

fn arb_ending() -> impl Strategy<Value = Ending> {
    prop_oneof![
        3 => Just(Ending::Done),
        1 => Just(Ending::Eof),
        1 => Just(Ending::Truncated),
    ]
}

/// A body plus sorted, possibly repeated cut offsets into it
fn arb_split_body() -> impl Strategy<Value = (Vec<BodyLine>, Ending, Vec<usize>)> {
    (proptest::collection::vec(arb_line(), 0..12), arb_ending()).prop_flat_map(|(lines, ending)| {
        let len = render_body(&lines, ending).len();
        let cuts = proptest::collection::vec(0..=len, 0..16).prop_map(|mut cuts| {
            cuts.sort_unstable();
            cuts
        });
        (Just(lines), Just(ending), cuts)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_decoding_is_chunk_boundary_invariant((lines, ending, cuts) in arb_split_body()) {
        let body = render_body(&lines, ending);
        let whole = decode_split(body.as_bytes(), &[]);
        let split = decode_split(body.as_bytes(), &cuts);
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn prop_decoding_matches_model((lines, ending, cuts) in arb_split_body()) {
        let body = render_body(&lines, ending);
        let events = decode_split(body.as_bytes(), &cuts);
        prop_assert_eq!(events, expected_events(&lines, ending));
    }

    #[test]
    fn prop_exactly_one_terminal_event_last((lines, ending, cuts) in arb_split_body()) {
        let body = render_body(&lines, ending);
        let events = decode_split(body.as_bytes(), &cuts);
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        prop_assert_eq!(terminals, 1);
        prop_assert!(events.last().is_some_and(StreamEvent::is_terminal));
    }

    #[test]
    fn prop_nothing_after_error_marker(
        before in proptest::collection::vec(arb_text(), 0..4),
        after in proptest::collection::vec(arb_text(), 1..4),
    ) {
        let mut body: String = before.iter().cloned().map(BodyLine::Delta).map(|l| l.render()).collect();
        body.push_str(&data_line(&ChunkRecord {
            chunk: "Error: upstream failed".into(),
            message_id: Some("m-1".into()),
            session_id: Some("s-1".into()),
            is_complete: true,
            has_artifacts: false,
            artifacts: None,
            error: Some(true),
        }));
        body.extend(after.iter().cloned().map(BodyLine::Delta).map(|l| l.render()));
        body.push_str("data: [DONE]\n");

        let events = decode_split(body.as_bytes(), &[]);
        prop_assert_eq!(events.len(), before.len() + 1);
        prop_assert_eq!(
            events.last(),
            Some(&StreamEvent::StreamError { message: "Error: upstream failed".into() })
        );
    }
}
