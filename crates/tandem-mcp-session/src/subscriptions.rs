//! Resource subscriptions
//!
//! Tracks which sessions want `notifications/resources/updated` for which
//! URIs. It never touches resource content. One registry is usually shared by
//! every session of a server so an update fans out to all of them.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

use tandem_mcp_protocol::ResourceUpdatedParams;
use tandem_mcp_protocol::methods::ResourceUpdated;

use crate::context::Peer;

#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<String, HashMap<String, Peer>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the peer was already subscribed
    pub fn subscribe(&self, uri: impl Into<String>, peer: Peer) -> bool {
        let uri = uri.into();
        let session_id = peer.session_id().to_string();
        debug!(session_id = %session_id, uri = %uri, "Subscribed to resource");
        self.subscriptions
            .write()
            .entry(uri)
            .or_default()
            .insert(session_id, peer)
            .is_none()
    }

    /// Idempotent. Returns whether a subscription was removed.
    pub fn unsubscribe(&self, uri: &str, session_id: &str) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let Some(peers) = subscriptions.get_mut(uri) else {
            return false;
        };
        let removed = peers.remove(session_id).is_some();
        if peers.is_empty() {
            subscriptions.remove(uri);
        }
        if removed {
            debug!(session_id = %session_id, uri = %uri, "Unsubscribed from resource");
        }
        removed
    }

    /// Drop every subscription held by a session
    pub fn remove_session(&self, session_id: &str) -> usize {
        let mut subscriptions = self.subscriptions.write();
        let mut removed = 0;
        subscriptions.retain(|_, peers| {
            if peers.remove(session_id).is_some() {
                removed += 1;
            }
            !peers.is_empty()
        });
        removed
    }

    pub fn is_subscribed(&self, uri: &str, session_id: &str) -> bool {
        self.subscriptions
            .read()
            .get(uri)
            .is_some_and(|peers| peers.contains_key(session_id))
    }

    pub fn subscriber_count(&self, uri: &str) -> usize {
        self.subscriptions.read().get(uri).map_or(0, HashMap::len)
    }

    /// Send `notifications/resources/updated` to every subscriber of `uri`.
    ///
    /// Returns how many peers were notified. Peers whose session has closed
    /// are pruned. With no subscribers this does nothing.
    pub async fn notify_updated(&self, uri: &str) -> usize {
        let peers: Vec<Peer> = match self.subscriptions.read().get(uri) {
            Some(peers) => peers.values().cloned().collect(),
            None => return 0,
        };

        let params = ResourceUpdatedParams {
            uri: uri.to_string(),
        };
        let mut delivered = 0;
        for peer in peers {
            if peer.is_closed() {
                self.unsubscribe(uri, peer.session_id());
                continue;
            }
            match peer.send_notification::<ResourceUpdated>(&params).await {
                Ok(()) => delivered += 1,
                Err(e) if e.is_connection_closed() => {
                    self.unsubscribe(uri, peer.session_id());
                }
                Err(e) => {
                    warn!(
                        session_id = %peer.session_id(),
                        uri = %uri,
                        error = %e,
                        "Update notification failed"
                    );
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleState;
    use crate::session::Session;
    use crate::transport::ChannelTransport;
    use tandem_mcp_protocol::{ClientCapabilities, Implementation, ServerCapabilities};

    fn detached_peer() -> Peer {
        let (transport, _other) = ChannelTransport::pair();
        Session::server(Implementation::new("test", "1"), ServerCapabilities::default())
            .start(transport)
            .unwrap()
            .peer()
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let peer = detached_peer();
        let session_id = peer.session_id().to_string();

        assert!(registry.subscribe("file:///a", peer.clone()));
        assert!(!registry.subscribe("file:///a", peer));
        assert_eq!(registry.subscriber_count("file:///a"), 1);

        assert!(registry.unsubscribe("file:///a", &session_id));
        assert!(!registry.unsubscribe("file:///a", &session_id));
        assert!(!registry.unsubscribe("file:///never", &session_id));
        assert_eq!(registry.subscriber_count("file:///a"), 0);
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_noop() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.notify_updated("file:///nobody").await, 0);
    }

    #[tokio::test]
    async fn test_remove_session_drops_all_uris() {
        let registry = SubscriptionRegistry::new();
        let peer = detached_peer();
        let session_id = peer.session_id().to_string();
        registry.subscribe("file:///a", peer.clone());
        registry.subscribe("file:///b", peer);

        assert_eq!(registry.remove_session(&session_id), 2);
        assert!(!registry.is_subscribed("file:///a", &session_id));
    }

    #[tokio::test]
    async fn test_update_reaches_subscribed_client() {
        let (client_end, server_end) = ChannelTransport::pair();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let server = Session::server(
            Implementation::new("server", "1"),
            ServerCapabilities::default().with_resources(true, false),
        )
        .start(server_end)
        .unwrap();
        let client_info = Implementation::new("client", "1");
        let client = Session::client(client_info, ClientCapabilities::default())
            .on::<ResourceUpdated, _, _>(move |params: ResourceUpdatedParams, _peer| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(params.uri);
                }
            })
            .start(client_end)
            .unwrap();
        client.initialize().await.unwrap();

        // The server is operating once it has processed the client's ack
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while server.state() != LifecycleState::Operating {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let registry = SubscriptionRegistry::new();
        registry.subscribe("file:///watched", server.peer());
        assert_eq!(registry.notify_updated("file:///watched").await, 1);

        let uri = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(uri, "file:///watched");
    }
}
