//! Progress tokens
//!
//! A token is minted when an outbound request asks for progress and is
//! released when that request resolves. Updates for unknown or released
//! tokens are dropped.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use tandem_mcp_json_rpc::{Params, RequestId};
use tandem_mcp_protocol::{ProgressParams, ProgressToken};

/// One progress notification as seen by the requester
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

impl From<ProgressParams> for ProgressUpdate {
    fn from(params: ProgressParams) -> Self {
        Self {
            progress: params.progress,
            total: params.total,
            message: params.message,
        }
    }
}

/// Updates for one request. Ends when the request resolves.
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<ProgressUpdate>,
}

impl ProgressStream {
    pub async fn next_update(&mut self) -> Option<ProgressUpdate> {
        self.rx.recv().await
    }
}

impl futures::Stream for ProgressStream {
    type Item = ProgressUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

struct TokenEntry {
    request_id: Option<RequestId>,
    last: Option<f64>,
    updates: mpsc::UnboundedSender<ProgressUpdate>,
}

pub struct ProgressTracker {
    next_token: AtomicI64,
    tokens: Mutex<HashMap<ProgressToken, TokenEntry>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            next_token: AtomicI64::new(1),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a token unique among live tokens of this session
    pub fn register(&self) -> (ProgressToken, ProgressStream) {
        let token = ProgressToken::Number(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.tokens.lock().insert(
            token.clone(),
            TokenEntry {
                request_id: None,
                last: None,
                updates: tx,
            },
        );
        (token, ProgressStream { rx })
    }

    /// Record which request carries the token, once its id is known
    pub fn bind(&self, token: &ProgressToken, request_id: RequestId) {
        if let Some(entry) = self.tokens.lock().get_mut(token) {
            entry.request_id = Some(request_id);
        }
    }

    /// Route an inbound `notifications/progress`. Returns whether it was delivered.
    pub fn deliver(&self, params: ProgressParams) -> bool {
        let mut tokens = self.tokens.lock();
        let Some(entry) = tokens.get_mut(&params.progress_token) else {
            debug!(token = %params.progress_token, "Dropping progress for unknown token");
            return false;
        };
        if let Some(last) = entry.last.filter(|last| params.progress < *last) {
            warn!(
                token = %params.progress_token,
                request_id = ?entry.request_id,
                last,
                progress = params.progress,
                "Progress went backwards"
            );
        }
        entry.last = Some(params.progress);
        entry.updates.send(ProgressUpdate::from(params)).is_ok()
    }

    /// Stop routing updates for the token; its stream ends
    pub fn release(&self, token: &ProgressToken) -> bool {
        self.tokens.lock().remove(token).is_some()
    }

    pub fn clear(&self) {
        self.tokens.lock().clear();
    }

    pub fn active(&self) -> usize {
        self.tokens.lock().len()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Place the token into `params._meta.progressToken`, keeping any other `_meta` fields
pub fn attach_token(params: Option<Params>, token: &ProgressToken) -> Params {
    let mut params = params.unwrap_or_default();
    let token = serde_json::to_value(token).unwrap_or(Value::Null);
    match params.get_mut("_meta") {
        Some(Value::Object(meta)) => {
            meta.insert("progressToken".to_string(), token);
        }
        _ => {
            let mut meta = Map::new();
            meta.insert("progressToken".to_string(), token);
            params.insert("_meta".to_string(), Value::Object(meta));
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_updates_reach_stream_until_release() {
        let tracker = ProgressTracker::new();
        let (token, mut stream) = tracker.register();
        tracker.bind(&token, RequestId::Number(3));

        assert!(tracker.deliver(ProgressParams::new(token.clone(), 1.0, Some(3.0))));
        assert!(tracker.deliver(
            ProgressParams::new(token.clone(), 2.0, Some(3.0)).with_message("halfway")
        ));
        assert!(tracker.release(&token));
        assert!(!tracker.deliver(ProgressParams::new(token.clone(), 3.0, Some(3.0))));

        let updates: Vec<ProgressUpdate> = stream.by_ref().collect().await;
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].message.as_deref(), Some("halfway"));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tracker = ProgressTracker::new();
        let (a, _sa) = tracker.register();
        let (b, _sb) = tracker.register();
        assert_ne!(a, b);
        assert_eq!(tracker.active(), 2);
        tracker.clear();
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn test_backwards_progress_is_still_forwarded() {
        let tracker = ProgressTracker::new();
        let (token, mut stream) = tracker.register();
        tracker.deliver(ProgressParams::new(token.clone(), 5.0, None));
        tracker.deliver(ProgressParams::new(token.clone(), 4.0, None));
        assert_eq!(stream.next_update().await.unwrap().progress, 5.0);
        assert_eq!(stream.next_update().await.unwrap().progress, 4.0);
    }

    #[test]
    fn test_attach_token_merges_meta() {
        let params = json!({"name": "slow", "_meta": {"trace": "x"}});
        let merged = attach_token(params.as_object().cloned(), &ProgressToken::Number(7));
        assert_eq!(
            Value::Object(merged),
            json!({"name": "slow", "_meta": {"trace": "x", "progressToken": 7}})
        );

        let fresh = attach_token(None, &ProgressToken::from("t"));
        assert_eq!(Value::Object(fresh), json!({"_meta": {"progressToken": "t"}}));
    }
}
