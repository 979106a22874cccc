//! Stream Events
//!
//! The typed events a client receives while a request is processed. Each
//! event becomes exactly one frame on the wire (see [`crate::transport::frame`]).
//!
//! # Event Ordering
//!
//! A well-formed stream for one request is either
//!
//! ```text
//! Start, (Progress | Thinking)*, ThinkingEnd,
//! ResponseStart, ResponseChunk+, ResponseEnd, End
//! ```
//!
//! or a prefix of that sequence cut short by `Error` followed by `End`.
//! [`validate_sequence`] checks a recorded stream against this grammar.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One event of the client-facing stream.
///
/// Serialized as a JSON object tagged by `type`:
/// `{"type":"response_chunk","content":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Processing has begun
    Start {
        /// Human-readable start notice
        message: String,
    },
    /// Intermediate agent activity
    Progress {
        /// Progress text as emitted by the agent
        message: String,
    },
    /// Reasoning output surfaced while the agent works
    Thinking {
        /// Reasoning text with the marker removed
        message: String,
    },
    /// No more progress or thinking events will follow
    ThinkingEnd,
    /// The final answer begins
    ResponseStart,
    /// One segment of the final answer
    ResponseChunk {
        /// Segment text
        content: String,
    },
    /// The final answer is complete
    ResponseEnd,
    /// The request failed
    Error {
        /// Failure description
        message: String,
    },
    /// Terminal event; nothing follows
    End,
}

impl StreamEvent {
    /// Create a start event
    pub fn start(message: impl Into<String>) -> Self {
        Self::Start {
            message: message.into(),
        }
    }

    /// Create a progress event
    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress {
            message: message.into(),
        }
    }

    /// Create a thinking event
    pub fn thinking(message: impl Into<String>) -> Self {
        Self::Thinking {
            message: message.into(),
        }
    }

    /// Create a response chunk
    pub fn chunk(content: impl Into<String>) -> Self {
        Self::ResponseChunk {
            content: content.into(),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The payload-free kind of this event
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::Progress { .. } => EventKind::Progress,
            Self::Thinking { .. } => EventKind::Thinking,
            Self::ThinkingEnd => EventKind::ThinkingEnd,
            Self::ResponseStart => EventKind::ResponseStart,
            Self::ResponseChunk { .. } => EventKind::ResponseChunk,
            Self::ResponseEnd => EventKind::ResponseEnd,
            Self::Error { .. } => EventKind::Error,
            Self::End => EventKind::End,
        }
    }

    /// Whether this event closes the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Event discriminant without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`StreamEvent::Start`]
    Start,
    /// See [`StreamEvent::Progress`]
    Progress,
    /// See [`StreamEvent::Thinking`]
    Thinking,
    /// See [`StreamEvent::ThinkingEnd`]
    ThinkingEnd,
    /// See [`StreamEvent::ResponseStart`]
    ResponseStart,
    /// See [`StreamEvent::ResponseChunk`]
    ResponseChunk,
    /// See [`StreamEvent::ResponseEnd`]
    ResponseEnd,
    /// See [`StreamEvent::Error`]
    Error,
    /// See [`StreamEvent::End`]
    End,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Thinking => "thinking",
            Self::ThinkingEnd => "thinking_end",
            Self::ResponseStart => "response_start",
            Self::ResponseChunk => "response_chunk",
            Self::ResponseEnd => "response_end",
            Self::Error => "error",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Sequence Validation
// ============================================================================

/// A recorded stream that breaks the ordering rules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    /// The stream contained no events
    #[error("stream is empty")]
    Empty,
    /// An event appeared where the grammar does not allow it
    #[error("unexpected {found} at position {position} (after {after})")]
    Unexpected {
        /// Index of the offending event
        position: usize,
        /// Kind of the offending event
        found: EventKind,
        /// Kind of the event before it
        after: EventKind,
    },
    /// The stream did not start with `start`
    #[error("stream must begin with start, found {0}")]
    BadStart(EventKind),
    /// The stream stopped before `end`
    #[error("stream ended after {0} without an end event")]
    Truncated(EventKind),
    /// `response_end` with no chunk in between
    #[error("response contained no chunks")]
    NoChunks,
}

/// Check that `events` is one complete, well-ordered request stream.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_sequence(events: &[StreamEvent]) -> Result<(), SequenceError> {
    use EventKind as K;

    let first = events.first().ok_or(SequenceError::Empty)?.kind();
    if first != K::Start {
        return Err(SequenceError::BadStart(first));
    }

    let mut prev = K::Start;
    for (position, event) in events.iter().enumerate().skip(1) {
        let found = event.kind();
        let allowed = match prev {
            K::Start | K::Progress | K::Thinking => matches!(
                found,
                K::Progress | K::Thinking | K::ThinkingEnd | K::Error
            ),
            K::ThinkingEnd => matches!(found, K::ResponseStart | K::Error),
            K::ResponseStart => {
                if found == K::ResponseEnd {
                    return Err(SequenceError::NoChunks);
                }
                matches!(found, K::ResponseChunk | K::Error)
            }
            K::ResponseChunk => matches!(found, K::ResponseChunk | K::ResponseEnd | K::Error),
            K::ResponseEnd | K::Error => found == K::End,
            K::End => false,
        };
        if !allowed {
            return Err(SequenceError::Unexpected {
                position,
                found,
                after: prev,
            });
        }
        prev = found;
    }

    if prev == K::End {
        Ok(())
    } else {
        Err(SequenceError::Truncated(prev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_shape_uses_type_tag() {
        let json = serde_json::to_string(&StreamEvent::chunk("done.")).unwrap();
        assert_eq!(json, r#"{"type":"response_chunk","content":"done."}"#);

        let json = serde_json::to_string(&StreamEvent::ThinkingEnd).unwrap();
        assert_eq!(json, r#"{"type":"thinking_end"}"#);

        let json = serde_json::to_string(&StreamEvent::start("go")).unwrap();
        assert_eq!(json, r#"{"type":"start","message":"go"}"#);
    }

    #[test]
    fn test_parses_client_payload() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert_eq!(event, StreamEvent::error("boom"));
        assert_eq!(event.kind().to_string(), "error");
    }

    #[test]
    fn test_validate_complete_stream() {
        let events = vec![
            StreamEvent::start("s"),
            StreamEvent::progress("step 1"),
            StreamEvent::thinking("hmm"),
            StreamEvent::ThinkingEnd,
            StreamEvent::ResponseStart,
            StreamEvent::chunk("a。"),
            StreamEvent::chunk("b"),
            StreamEvent::ResponseEnd,
            StreamEvent::End,
        ];
        assert_eq!(validate_sequence(&events), Ok(()));
    }

    #[test]
    fn test_validate_error_stream() {
        let events = vec![
            StreamEvent::start("s"),
            StreamEvent::error("boom"),
            StreamEvent::End,
        ];
        assert_eq!(validate_sequence(&events), Ok(()));
    }

    #[test]
    fn test_chunk_before_response_start_rejected() {
        let events = vec![
            StreamEvent::start("s"),
            StreamEvent::ThinkingEnd,
            StreamEvent::chunk("early"),
        ];
        assert!(matches!(
            validate_sequence(&events),
            Err(SequenceError::Unexpected {
                found: EventKind::ResponseChunk,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_end_rejected() {
        let events = vec![StreamEvent::start("s"), StreamEvent::ThinkingEnd];
        assert_eq!(
            validate_sequence(&events),
            Err(SequenceError::Truncated(EventKind::ThinkingEnd))
        );
        assert_eq!(validate_sequence(&[]), Err(SequenceError::Empty));
    }

    #[test]
    fn test_event_after_end_rejected() {
        let events = vec![
            StreamEvent::start("s"),
            StreamEvent::error("x"),
            StreamEvent::End,
            StreamEvent::End,
        ];
        assert!(validate_sequence(&events).is_err());
    }
}
