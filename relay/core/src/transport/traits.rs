//! Transport Traits

use async_trait::async_trait;
use bytes::Bytes;

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The client went away; nothing more can be written
    #[error("Connection closed")]
    ConnectionClosed,

    /// An event could not be turned into a frame (or back)
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation not allowed in the current stream state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the error means the peer disconnected
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

/// Destination for encoded frames.
///
/// Each call writes exactly one complete frame and returns once the frame
/// has been handed to the transport.
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), TransportError>;
}

#[async_trait]
impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    async fn write_frame(&mut self, frame: Bytes) -> Result<(), TransportError> {
        (**self).write_frame(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_detection() {
        assert!(TransportError::ConnectionClosed.is_disconnect());
        assert!(TransportError::Io(std::io::ErrorKind::BrokenPipe.into()).is_disconnect());
        assert!(!TransportError::SerializationError("x".into()).is_disconnect());
        assert!(!TransportError::InvalidState("x".into()).is_disconnect());
    }
}
