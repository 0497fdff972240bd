//! Lifecycle state machine
//!
//! `Uninitialized -> Initializing -> Operating -> ShuttingDown -> Closed`
//!
//! The legality checks here are pure functions of (state, role, method) so
//! the inbound loop and the outbound API apply exactly the same rules.

use std::fmt;
use tokio::sync::watch;

use tandem_mcp_protocol::McpVersion;
use tandem_mcp_protocol::methods::{
    Cancelled, Initialize, Initialized, McpNotification, McpRequest, Ping, Progress,
};

use crate::error::{SessionError, SessionResult};

/// Which end of the pairing this session is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Client,
    Server,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Client => f.write_str("client"),
            SessionRole::Server => f.write_str("server"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Operating,
    ShuttingDown,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Operating => "operating",
            LifecycleState::ShuttingDown => "shutting down",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared lifecycle cell. Observers can wait on transitions.
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Uninitialized);
        Self { state }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Atomically move to `to` if the current state is one of `from`.
    /// Returns the state that was replaced.
    pub fn transition(
        &self,
        from: &[LifecycleState],
        to: LifecycleState,
    ) -> Result<LifecycleState, LifecycleState> {
        let mut outcome = Err(LifecycleState::Closed);
        self.state.send_if_modified(|current| {
            if from.contains(current) {
                outcome = Ok(*current);
                *current = to;
                true
            } else {
                outcome = Err(*current);
                false
            }
        });
        outcome
    }

    /// Move to `Closed` from any state. Returns false if already closed.
    pub fn close(&self) -> bool {
        self.state.send_if_modified(|current| {
            if *current == LifecycleState::Closed {
                false
            } else {
                *current = LifecycleState::Closed;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Why an inbound request is refused. Always answered with InvalidRequest.
pub fn check_inbound_request(
    state: LifecycleState,
    role: SessionRole,
    method: &str,
) -> Result<(), &'static str> {
    if state == LifecycleState::Closed {
        return Err("session is closed");
    }
    if method == Ping::METHOD {
        return Ok(());
    }
    match state {
        LifecycleState::Uninitialized => {
            if method == Initialize::METHOD && role == SessionRole::Server {
                Ok(())
            } else {
                Err("session has not been initialized")
            }
        }
        LifecycleState::Initializing => {
            if method == Initialize::METHOD {
                Err("initialization already in progress")
            } else {
                Err("session has not been initialized")
            }
        }
        LifecycleState::Operating => {
            if method == Initialize::METHOD {
                Err("session is already initialized")
            } else {
                Ok(())
            }
        }
        LifecycleState::ShuttingDown => Err("session is shutting down"),
        LifecycleState::Closed => Err("session is closed"),
    }
}

/// Whether an inbound notification may be processed; illegal ones are dropped.
///
/// Cancellation and progress refer to requests that were themselves legal,
/// so they are accepted in every state before `Closed`.
pub fn check_inbound_notification(
    state: LifecycleState,
    role: SessionRole,
    method: &str,
) -> bool {
    match state {
        LifecycleState::Closed => false,
        _ if method == Cancelled::METHOD || method == Progress::METHOD => true,
        LifecycleState::Initializing if method == Initialized::METHOD => {
            role == SessionRole::Server
        }
        LifecycleState::Operating => method != Initialized::METHOD,
        _ => false,
    }
}

/// Outbound requests other than `initialize` (sent by the handshake itself)
pub fn check_outbound_request(state: LifecycleState, method: &str) -> SessionResult<()> {
    let legal = match state {
        LifecycleState::Closed => false,
        LifecycleState::ShuttingDown => false,
        _ if method == Ping::METHOD => true,
        LifecycleState::Operating => method != Initialize::METHOD,
        _ => false,
    };
    if legal {
        Ok(())
    } else {
        Err(SessionError::invalid_state(state, format!("send '{}'", method)))
    }
}

/// Outbound notifications other than `notifications/initialized`
pub fn check_outbound_notification(state: LifecycleState, method: &str) -> SessionResult<()> {
    let legal = match state {
        LifecycleState::Closed => false,
        _ if method == Cancelled::METHOD || method == Progress::METHOD => true,
        LifecycleState::Operating | LifecycleState::ShuttingDown => method != Initialized::METHOD,
        _ => false,
    };
    if legal {
        Ok(())
    } else {
        Err(SessionError::invalid_state(state, format!("send '{}'", method)))
    }
}

/// Responder side: echo the proposal when supported, otherwise offer our newest.
pub fn negotiate_version(requested: &str, supported: &[McpVersion]) -> McpVersion {
    McpVersion::parse(requested)
        .filter(|v| supported.contains(v))
        .or_else(|| supported.iter().copied().max())
        .unwrap_or(McpVersion::LATEST)
}

/// Initiator side: accept the responder's answer or refuse to proceed.
pub fn accept_version(offered: &str, supported: &[McpVersion]) -> SessionResult<McpVersion> {
    McpVersion::parse(offered)
        .filter(|v| supported.contains(v))
        .ok_or_else(|| SessionError::UnsupportedVersion(offered.to_string()))
}
