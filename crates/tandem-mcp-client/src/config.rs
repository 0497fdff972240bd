//! Configuration types for MCP client

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tandem_mcp_protocol::Implementation;
use tandem_mcp_session::SessionConfig;
use tandem_mcp_session::config::duration_serde;

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Client identification sent in `initialize`
    pub client_info: ClientInfo,

    /// Timeout configurations
    pub timeouts: TimeoutConfig,

    /// Version list and tombstone limit. Its timeouts are replaced by
    /// `timeouts` when the session starts.
    pub session: SessionConfig,
}

/// Client identification information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
    /// Human-readable display name
    pub title: Option<String>,
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout for individual operations
    #[serde(with = "duration_serde")]
    pub request: Duration,

    /// Wait for the server's `initialize` response
    #[serde(with = "duration_serde")]
    pub initialization: Duration,

    /// Grace period for outstanding requests on disconnect
    #[serde(with = "duration_serde")]
    pub shutdown: Duration,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "tandem-mcp-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            initialization: Duration::from_secs(15),
            shutdown: Duration::from_secs(5),
        }
    }
}

impl ClientInfo {
    pub fn implementation(&self) -> Implementation {
        let implementation = Implementation::new(&self.name, &self.version);
        match &self.title {
            Some(title) => implementation.with_title(title),
            None => implementation,
        }
    }
}

impl ClientConfig {
    /// The session configuration with this config's timeouts applied
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            request_timeout: self.timeouts.request,
            initialize_timeout: self.timeouts.initialization,
            shutdown_grace: self.timeouts.shutdown,
            ..self.session.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timeouts_override_session_config() {
        let config = ClientConfig {
            timeouts: TimeoutConfig {
                request: Duration::from_millis(250),
                ..TimeoutConfig::default()
            },
            ..ClientConfig::default()
        };
        let session = config.session_config();
        assert_eq!(session.request_timeout, Duration::from_millis(250));
        assert_eq!(session.initialize_timeout, Duration::from_secs(15));
        assert_eq!(session.supported_versions, SessionConfig::default().supported_versions);
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_value(json!({
            "client_info": {"name": "inspector"},
            "timeouts": {"request": 1500}
        }))
        .unwrap();
        assert_eq!(config.client_info.name, "inspector");
        assert_eq!(config.client_info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.timeouts.request, Duration::from_millis(1500));
        assert_eq!(config.timeouts.shutdown, Duration::from_secs(5));
    }

    #[test]
    fn test_config_serialization() {
        let config = ClientConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }
}
