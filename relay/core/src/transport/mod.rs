//! Transport Layer for the Client Event Stream
//!
//! Provides the pieces between a [`StreamEvent`](crate::events::StreamEvent)
//! and the bytes a client reads:
//! - `frame`: server-sent-events framing (`data: <json>\n\n`) and decoding
//! - `traits`: the [`FrameSink`] seam the orchestrator writes through
//! - `channel`: sinks backed by tokio channels (HTTP body, tests)
//!
//! # Design Philosophy
//!
//! The orchestrator never sees sockets or HTTP types. It writes whole frames
//! into a sink; a failed write means the client is gone and is reported as
//! [`TransportError::ConnectionClosed`].

pub mod channel;
pub mod frame;
pub mod traits;

// Re-exports for convenience
pub use channel::{channel_sink, ChannelSink, CollectingSink};
pub use frame::{FrameDecoder, FrameEncoder};
pub use traits::{FrameSink, TransportError};
