//! Request correlation
//!
//! Every outbound request gets a fresh id and a pending entry holding the
//! channel its waiter listens on. An entry leaves the table exactly once,
//! through a response, a local cancellation, a timeout or session teardown;
//! whichever happens first wins and the others find nothing to do.
//!
//! Ids are never reused within a session. Cancelled and timed-out ids are
//! remembered for a while so that the peer's late answer can be dropped
//! quietly instead of being reported as unknown.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, oneshot};
use tracing::{debug, warn};

use tandem_mcp_json_rpc::{JsonRpcErrorObject, RequestId};
use tandem_mcp_protocol::ProgressToken;

use crate::error::{SessionError, SessionResult};

/// Receives the outcome of one outbound request
pub type ResponseReceiver = oneshot::Receiver<SessionResult<Value>>;

struct PendingRequest {
    method: String,
    issued_at: Instant,
    progress_token: Option<ProgressToken>,
    result_channel: oneshot::Sender<SessionResult<Value>>,
}

/// What was removed from the table
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub id: RequestId,
    pub method: String,
    pub progress_token: Option<ProgressToken>,
    pub elapsed: Duration,
}

/// Outcome of feeding a response into the table
#[derive(Debug)]
pub enum Resolution {
    /// The waiter received it
    Delivered(ResolvedRequest),
    /// Late answer to a request we already gave up on
    Discarded,
    /// Nothing was ever pending under this id
    Unknown,
}

#[derive(Default)]
struct Tombstones {
    order: VecDeque<RequestId>,
    ids: HashSet<RequestId>,
}

impl Tombstones {
    fn insert(&mut self, id: RequestId, capacity: usize) {
        if capacity == 0 || !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
    }

    fn take(&mut self, id: &RequestId) -> bool {
        if self.ids.remove(id) {
            self.order.retain(|kept| kept != id);
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
struct TableState {
    pending: HashMap<RequestId, PendingRequest>,
    tombstones: Tombstones,
    closed: Option<String>,
}

pub struct CorrelationTable {
    next_id: AtomicI64,
    max_tombstones: usize,
    state: Mutex<TableState>,
    drained: Notify,
}

impl CorrelationTable {
    pub fn new(max_tombstones: usize) -> Self {
        Self {
            next_id: AtomicI64::new(1),
            max_tombstones,
            state: Mutex::new(TableState::default()),
            drained: Notify::new(),
        }
    }

    /// Allocate an id and register a waiter for it.
    ///
    /// Fails once the table has been failed by teardown.
    pub fn issue(
        &self,
        method: &str,
        progress_token: Option<ProgressToken>,
    ) -> SessionResult<(RequestId, ResponseReceiver)> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock();
        if let Some(reason) = &state.closed {
            return Err(SessionError::ConnectionClosed(reason.clone()));
        }
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        state.pending.insert(
            id.clone(),
            PendingRequest {
                method: method.to_string(),
                issued_at: Instant::now(),
                progress_token,
                result_channel: tx,
            },
        );
        debug!(request_id = %id, method = %method, "Issued outbound request");
        Ok((id, rx))
    }

    /// Hand a response or error to the matching waiter
    pub fn resolve(
        &self,
        id: &RequestId,
        outcome: Result<Value, JsonRpcErrorObject>,
    ) -> Resolution {
        let (resolution, delivery) = {
            let mut state = self.state.lock();
            match state.pending.remove(id) {
                Some(pending) => {
                    let summary = summarize(id, &pending);
                    (Resolution::Delivered(summary), Some(pending.result_channel))
                }
                None if state.tombstones.take(id) => (Resolution::Discarded, None),
                None => (Resolution::Unknown, None),
            }
        };

        match (&resolution, delivery) {
            (Resolution::Delivered(summary), Some(channel)) => {
                debug!(
                    request_id = %id,
                    method = %summary.method,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Resolved outbound request"
                );
                // The waiter may have been dropped; that is its choice
                let _ = channel.send(outcome.map_err(SessionError::from));
                self.notify_if_drained();
            }
            (Resolution::Discarded, _) => {
                debug!(request_id = %id, "Discarding late response to an abandoned request");
            }
            _ => {
                warn!(request_id = %id, "Received response for unknown request id");
            }
        }
        resolution
    }

    /// Resolve the waiter with `Cancelled` and remember the id
    pub fn cancel(&self, id: &RequestId, reason: Option<String>) -> Option<ResolvedRequest> {
        self.abandon(id, SessionError::Cancelled { reason })
    }

    /// Resolve the waiter with `error` and remember the id
    pub fn abandon(&self, id: &RequestId, error: SessionError) -> Option<ResolvedRequest> {
        let pending = {
            let mut state = self.state.lock();
            let pending = state.pending.remove(id)?;
            state.tombstones.insert(id.clone(), self.max_tombstones);
            pending
        };
        let summary = summarize(id, &pending);
        debug!(
            request_id = %id,
            method = %summary.method,
            error = %error,
            "Abandoned outbound request"
        );
        let _ = pending.result_channel.send(Err(error));
        self.notify_if_drained();
        Some(summary)
    }

    /// Fail every waiter with `ConnectionClosed` and refuse new requests.
    /// Returns how many waiters were failed; a second call fails none.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut state = self.state.lock();
            if state.closed.is_none() {
                state.closed = Some(reason.to_string());
            }
            state.pending.drain().map(|(_, pending)| pending).collect()
        };
        let count = drained.len();
        for pending in drained {
            let _ = pending
                .result_channel
                .send(Err(SessionError::ConnectionClosed(reason.to_string())));
        }
        if count > 0 {
            debug!(count, reason = %reason, "Failed outstanding requests");
        }
        self.drained.notify_waiters();
        count
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.state.lock().pending.contains_key(id)
    }

    /// Wait until no request is outstanding
    pub async fn drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn notify_if_drained(&self) {
        if self.outstanding() == 0 {
            self.drained.notify_waiters();
        }
    }
}

fn summarize(id: &RequestId, pending: &PendingRequest) -> ResolvedRequest {
    ResolvedRequest {
        id: id.clone(),
        method: pending.method.clone(),
        progress_token: pending.progress_token.clone(),
        elapsed: pending.issued_at.elapsed(),
    }
}
