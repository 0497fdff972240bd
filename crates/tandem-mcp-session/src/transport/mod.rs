//! Transport abstraction
//!
//! A transport moves whole frames, one JSON-RPC message per frame, in order.
//! The session engine only ever calls `receive` from its single inbound loop,
//! while `send` may be called concurrently from many tasks; implementations
//! must write frames from concurrent senders whole and in call order.

use async_trait::async_trait;

use crate::error::TransportError;

pub mod channel;
pub mod line;

pub use channel::ChannelTransport;
pub use line::LineTransport;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Write one frame. Frames must not contain the framing delimiter.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Next complete frame, or `None` at end of stream
    async fn receive(&self) -> Result<Option<String>, TransportError>;

    /// Stop sending. The peer observes end of stream. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Reject frames that would break line framing
pub(crate) fn check_frame(frame: &str) -> Result<(), TransportError> {
    if frame.contains('\n') || frame.contains('\r') {
        return Err(TransportError::EmbeddedDelimiter);
    }
    Ok(())
}
