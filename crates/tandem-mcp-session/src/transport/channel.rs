//! In-memory frame transport, for tests and in-process peers

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, mpsc};

use super::{Transport, check_frame};
use crate::error::TransportError;

/// One end of an in-memory duplex frame channel
pub struct ChannelTransport {
    tx: SyncMutex<Option<mpsc::UnboundedSender<String>>>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl ChannelTransport {
    /// Two connected ends: frames sent on one are received on the other
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: SyncMutex::new(Some(left_tx)),
                rx: Mutex::new(left_rx),
            },
            Self {
                tx: SyncMutex::new(Some(right_tx)),
                rx: Mutex::new(right_rx),
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        check_frame(&frame)?;
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.tx.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_duplex_and_ordered() {
        let (left, right) = ChannelTransport::pair();
        for i in 0..5 {
            left.send(format!("{{\"n\":{}}}", i)).await.unwrap();
        }
        right.send("{\"back\":true}".to_string()).await.unwrap();

        for i in 0..5 {
            assert_eq!(right.receive().await.unwrap(), Some(format!("{{\"n\":{}}}", i)));
        }
        assert_eq!(left.receive().await.unwrap().as_deref(), Some("{\"back\":true}"));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (left, right) = ChannelTransport::pair();
        left.send("{}".to_string()).await.unwrap();
        left.close().await.unwrap();

        assert_eq!(right.receive().await.unwrap().as_deref(), Some("{}"));
        assert_eq!(right.receive().await.unwrap(), None);
        assert!(matches!(left.send("{}".to_string()).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_dropped_peer_fails_send() {
        let (left, right) = ChannelTransport::pair();
        drop(right);
        assert!(matches!(left.send("{}".to_string()).await, Err(TransportError::Closed)));
    }
}
