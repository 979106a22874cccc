//! Channel-backed Frame Sinks
//!
//! [`ChannelSink`] feeds frames into a bounded tokio channel whose receiving
//! half becomes an HTTP response body. When the body is dropped (client
//! disconnected) the next write fails with [`TransportError::ConnectionClosed`].
//!
//! [`CollectingSink`] keeps frames in memory and can be told to fail after a
//! number of writes, which is how disconnects are simulated.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::frame::FrameDecoder;
use super::{FrameSink, TransportError};
use crate::events::StreamEvent;

/// Body chunk type accepted by HTTP stream bodies
pub type BodyChunk = Result<Bytes, Infallible>;

/// Create a connected sink and body stream.
///
/// `capacity` bounds the number of frames in flight; a slow client applies
/// backpressure to the writer.
#[must_use]
pub fn channel_sink(capacity: usize) -> (ChannelSink, ReceiverStream<BodyChunk>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink { tx }, ReceiverStream::new(rx))
}

/// Sink writing frames into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<BodyChunk>,
}

impl ChannelSink {
    /// Whether the receiving side is gone
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.tx
            .send(Ok(frame))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

/// In-memory sink recording every frame written
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    frames: Arc<Mutex<Vec<Bytes>>>,
    fail_after: Option<usize>,
}

impl CollectingSink {
    /// Create a sink that accepts every write
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink whose writes fail once `frames` frames were accepted
    #[must_use]
    pub fn failing_after(frames: usize) -> Self {
        Self {
            frames: Arc::default(),
            fail_after: Some(frames),
        }
    }

    /// Raw frames written so far
    #[must_use]
    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    /// Decode every recorded frame back into events
    ///
    /// # Errors
    ///
    /// Fails if a recorded frame is not a valid event frame.
    pub fn events(&self) -> Result<Vec<StreamEvent>, TransportError> {
        let mut decoder = FrameDecoder::new();
        for frame in self.frames.lock().iter() {
            decoder.push(frame);
        }
        decoder.decode_all()
    }
}

#[async_trait]
impl FrameSink for CollectingSink {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let mut frames = self.frames.lock();
        if self.fail_after.is_some_and(|limit| frames.len() >= limit) {
            return Err(TransportError::ConnectionClosed);
        }
        frames.push(frame);
        Ok(())
    }
}
