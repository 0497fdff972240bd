//! Configuration types for sessions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tandem_mcp_protocol::McpVersion;

use crate::error::{SessionError, SessionResult};

/// Per-session tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Default wait for a response to an outbound request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Wait for the `initialize` response
    #[serde(with = "duration_serde")]
    pub initialize_timeout: Duration,

    /// How long `shutdown` waits for outstanding requests before failing them
    #[serde(with = "duration_serde")]
    pub shutdown_grace: Duration,

    /// Protocol versions this endpoint will agree to, any order
    pub supported_versions: Vec<McpVersion>,

    /// Cancelled ids remembered so their late responses are dropped quietly
    pub max_cancelled_tombstones: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            initialize_timeout: Duration::from_secs(15),
            shutdown_grace: Duration::from_secs(5),
            supported_versions: McpVersion::ALL.to_vec(),
            max_cancelled_tombstones: 1024,
        }
    }
}

impl SessionConfig {
    /// The version proposed when initiating, the newest supported one
    pub fn preferred_version(&self) -> McpVersion {
        self.supported_versions
            .iter()
            .copied()
            .max()
            .unwrap_or(McpVersion::LATEST)
    }

    pub fn supports(&self, version: McpVersion) -> bool {
        self.supported_versions.contains(&version)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_supported_versions(mut self, versions: Vec<McpVersion>) -> Self {
        self.supported_versions = versions;
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.supported_versions.is_empty() {
            return Err(SessionError::Config(
                "at least one protocol version must be supported".to_string(),
            ));
        }
        if self.request_timeout.is_zero() || self.initialize_timeout.is_zero() {
            return Err(SessionError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Pagination of list operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 50 }
    }
}

/// Serialize a `Duration` as whole milliseconds
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
