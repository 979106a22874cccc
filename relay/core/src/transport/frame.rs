//! Frame Protocol
//!
//! Wire format for stream events: one server-sent-events message per event.
//!
//! # Frame Format
//!
//! ```text
//! data: {"type":"progress","message":"step 1"}\n
//! \n
//! ```
//!
//! The payload is a single-line JSON object (serde_json never emits raw
//! newlines), so every frame is exactly one `data:` line plus a blank line.
//!
//! # Security
//!
//! - Maximum frame size is enforced on both encode and decode
//! - The decoder never buffers more than one oversized frame before failing

use bytes::{Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

use super::TransportError;

/// Maximum frame size (10 MB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

const DATA_PREFIX: &[u8] = b"data: ";
const FRAME_TERMINATOR: &[u8] = b"\n\n";

/// Encode a message as one SSE frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` if:
/// - JSON serialization fails
/// - Resulting frame exceeds `MAX_FRAME_SIZE`
pub fn encode<T: Serialize>(msg: &T) -> Result<Bytes, TransportError> {
    let json =
        serde_json::to_vec(msg).map_err(|e| TransportError::SerializationError(e.to_string()))?;

    let frame_len = DATA_PREFIX.len() + json.len() + FRAME_TERMINATOR.len();
    if frame_len > MAX_FRAME_SIZE {
        return Err(TransportError::SerializationError(format!(
            "Frame too large: {frame_len} bytes (max: {MAX_FRAME_SIZE})"
        )));
    }

    let mut buf = BytesMut::with_capacity(frame_len);
    buf.extend_from_slice(DATA_PREFIX);
    buf.extend_from_slice(&json);
    buf.extend_from_slice(FRAME_TERMINATOR);
    Ok(buf.freeze())
}

/// Encoder for streaming frame output
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameEncoder;

impl FrameEncoder {
    /// Create a new encoder
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode a message to bytes
    ///
    /// # Errors
    ///
    /// See [`encode`].
    pub fn encode<T: Serialize>(&self, msg: &T) -> Result<Bytes, TransportError> {
        encode(msg)
    }
}

/// Decoder for a server-sent-events byte stream
///
/// Buffers incoming bytes and yields complete messages. Comment lines
/// (`:`), other SSE fields and frames without data are skipped.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of bytes available in the buffer
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Try to decode the next frame
    ///
    /// Returns:
    /// - `Ok(Some(msg))` if a complete frame was decoded
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` if the frame is oversized or its payload is invalid
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        loop {
            let pending = &self.buffer[self.read_pos..];
            let Some(end) = find_terminator(pending) else {
                if pending.len() > MAX_FRAME_SIZE {
                    return Err(TransportError::SerializationError(format!(
                        "Frame size exceeds maximum {MAX_FRAME_SIZE}"
                    )));
                }
                return Ok(None);
            };

            let frame = &pending[..end];
            let data = frame_data(frame);
            self.read_pos += end + FRAME_TERMINATOR.len();

            if let Some(data) = data {
                let msg = serde_json::from_slice(&data)
                    .map_err(|e| TransportError::SerializationError(e.to_string()))?;
                return Ok(Some(msg));
            }
        }
    }

    /// Decode every complete frame currently buffered
    ///
    /// # Errors
    ///
    /// Stops at the first invalid frame.
    pub fn decode_all<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, TransportError> {
        let mut out = Vec::new();
        while let Some(msg) = self.decode()? {
            out.push(msg);
        }
        Ok(out)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_TERMINATOR.len())
        .position(|w| w == FRAME_TERMINATOR)
}

/// Collect the `data:` lines of one frame, joined by newline
fn frame_data(frame: &[u8]) -> Option<Vec<u8>> {
    let mut data: Option<Vec<u8>> = None;
    for line in frame.split(|b| *b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(value) = line.strip_prefix(b"data:") else {
            continue;
        };
        let value = value.strip_prefix(b" ").unwrap_or(value);
        match data.as_mut() {
            Some(existing) => {
                existing.push(b'\n');
                existing.extend_from_slice(value);
            }
            None => data = Some(value.to_vec()),
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamEvent;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_exact_bytes() {
        let encoded = encode(&StreamEvent::progress("step 1")).unwrap();
        assert_eq!(
            &encoded[..],
            b"data: {\"type\":\"progress\",\"message\":\"step 1\"}\n\n"
        );

        let encoded = FrameEncoder::new().encode(&StreamEvent::End).unwrap();
        assert_eq!(&encoded[..], b"data: {\"type\":\"end\"}\n\n");
    }

    #[test]
    fn test_multiline_content_stays_one_line() {
        let encoded = encode(&StreamEvent::chunk("a\nb")).unwrap();
        let text = std::str::from_utf8(&encoded).unwrap();
        assert_eq!(text.matches('\n').count(), 2);
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_decode_partial_frame() {
        let encoded = encode(&StreamEvent::chunk("结果：成功。")).unwrap();
        let (head, tail) = encoded.split_at(10);

        let mut decoder = FrameDecoder::new();
        decoder.push(head);
        let result: Result<Option<StreamEvent>, _> = decoder.decode();
        assert!(matches!(result, Ok(None)));

        decoder.push(tail);
        let decoded: StreamEvent = decoder.decode().unwrap().unwrap();
        assert_eq!(decoded, StreamEvent::chunk("结果：成功。"));
        assert_eq!(decoder.available(), 0);
    }

    #[test]
    fn test_decode_multiple_frames() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode(&StreamEvent::start("go")).unwrap());
        bytes.extend_from_slice(b": keep-alive\n\n");
        bytes.extend_from_slice(&encode(&StreamEvent::End).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        let events: Vec<StreamEvent> = decoder.decode_all().unwrap();
        assert_eq!(events, vec![StreamEvent::start("go"), StreamEvent::End]);
    }

    #[test]
    fn test_decode_crlf_and_no_space() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data:{\"type\":\"response_start\"}\r\n\n");
        let decoded: StreamEvent = decoder.decode().unwrap().unwrap();
        assert_eq!(decoded, StreamEvent::ResponseStart);
    }

    #[test]
    fn test_decode_invalid_json() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {not json}\n\n");
        let result: Result<Option<StreamEvent>, _> = decoder.decode();
        assert!(matches!(result, Err(TransportError::SerializationError(_))));
    }

    #[test]
    fn test_clear() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: {");
        assert!(decoder.available() > 0);
        decoder.clear();
        assert_eq!(decoder.available(), 0);
    }
}
