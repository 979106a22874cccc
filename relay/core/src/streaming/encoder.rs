//! Stream Encoder
//!
//! Writes events to a [`FrameSink`], one frame per event, and paces answer
//! chunks.

use std::time::Duration;

use crate::events::StreamEvent;
use crate::transport::{FrameEncoder, FrameSink, TransportError};

/// Serializes events onto a sink
#[derive(Debug)]
pub struct StreamEncoder<S> {
    sink: S,
    frame_encoder: FrameEncoder,
    chunk_delay: Duration,
    frames_written: usize,
    closed: bool,
}

impl<S: FrameSink> StreamEncoder<S> {
    /// Create an encoder that waits `chunk_delay` before each answer chunk
    pub fn new(sink: S, chunk_delay: Duration) -> Self {
        Self {
            sink,
            frame_encoder: FrameEncoder::new(),
            chunk_delay,
            frames_written: 0,
            closed: false,
        }
    }

    /// Write one event as one frame.
    ///
    /// # Errors
    ///
    /// - `TransportError::InvalidState` once `End` has been written
    /// - `TransportError::SerializationError` if the event cannot be encoded
    /// - whatever the sink reports (usually `ConnectionClosed`)
    pub async fn emit(&mut self, event: StreamEvent) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::InvalidState(format!(
                "stream already ended, refusing {}",
                event.kind()
            )));
        }

        let frame = self.frame_encoder.encode(&event)?;
        self.sink.write_frame(frame).await?;
        self.frames_written += 1;

        if event.is_terminal() {
            self.closed = true;
        }
        Ok(())
    }

    /// Wait the chunk delay, then write one answer chunk
    ///
    /// # Errors
    ///
    /// See [`emit`](Self::emit).
    pub async fn emit_chunk(&mut self, content: impl Into<String>) -> Result<(), TransportError> {
        if !self.chunk_delay.is_zero() {
            tokio::time::sleep(self.chunk_delay).await;
        }
        self.emit(StreamEvent::chunk(content)).await
    }

    /// Frames successfully written
    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Whether `End` has been written
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Give back the sink
    pub fn into_inner(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CollectingSink;
    use pretty_assertions::assert_eq;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_one_frame_per_event() {
        let sink = CollectingSink::new();
        let mut encoder = StreamEncoder::new(sink.clone(), Duration::ZERO);

        encoder.emit(StreamEvent::start("s")).await.unwrap();
        encoder.emit(StreamEvent::ThinkingEnd).await.unwrap();
        assert_eq!(encoder.frames_written(), 2);
        assert_eq!(sink.frames().len(), 2);
        assert_eq!(
            sink.events().unwrap(),
            vec![StreamEvent::start("s"), StreamEvent::ThinkingEnd]
        );
    }

    #[tokio::test]
    async fn test_nothing_after_end() {
        let sink = CollectingSink::new();
        let mut encoder = StreamEncoder::new(sink.clone(), Duration::ZERO);

        encoder.emit(StreamEvent::End).await.unwrap();
        assert!(encoder.is_closed());
        let result = encoder.emit(StreamEvent::progress("late")).await;
        assert!(matches!(result, Err(TransportError::InvalidState(_))));
        assert_eq!(sink.frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_is_paced() {
        let mut encoder = StreamEncoder::new(CollectingSink::new(), Duration::from_millis(300));
        let started = Instant::now();
        encoder.emit_chunk("a。").await.unwrap();
        encoder.emit_chunk("b").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(600));
        assert_eq!(
            encoder.into_inner().events().unwrap(),
            vec![StreamEvent::chunk("a。"), StreamEvent::chunk("b")]
        );
    }

    #[tokio::test]
    async fn test_sink_failure_propagates() {
        let mut encoder = StreamEncoder::new(CollectingSink::failing_after(0), Duration::ZERO);
        let result = encoder.emit(StreamEvent::start("s")).await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
        assert_eq!(encoder.frames_written(), 0);
    }
}
