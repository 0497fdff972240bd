//! MCP Logging Protocol Types
//!
//! Levels follow the RFC 5424 syslog severities and are ordered from least
//! to most severe, so `level >= threshold` decides whether a message is sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    #[default]
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LoggingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggingLevel::Debug => "debug",
            LoggingLevel::Info => "info",
            LoggingLevel::Notice => "notice",
            LoggingLevel::Warning => "warning",
            LoggingLevel::Error => "error",
            LoggingLevel::Critical => "critical",
            LoggingLevel::Alert => "alert",
            LoggingLevel::Emergency => "emergency",
        }
    }

    /// Whether a message at this level passes a session threshold
    pub fn passes(&self, threshold: LoggingLevel) -> bool {
        *self >= threshold
    }
}

impl fmt::Display for LoggingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggingLevel {
    type Err = crate::McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_ascii_lowercase())).map_err(|_| {
            crate::McpError::InvalidParameters(format!("unknown logging level '{}'", s))
        })
    }
}

/// Params of `logging/setLevel`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLevelParams {
    pub level: LoggingLevel,
}

/// Params of `notifications/message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub data: Value,
}

impl LoggingMessageParams {
    pub fn new(level: LoggingLevel, data: Value) -> Self {
        Self {
            level,
            logger: None,
            data,
        }
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(LoggingLevel::Debug < LoggingLevel::Info);
        assert!(LoggingLevel::Warning < LoggingLevel::Error);
        assert!(LoggingLevel::Alert < LoggingLevel::Emergency);
        assert!(LoggingLevel::Error.passes(LoggingLevel::Warning));
        assert!(!LoggingLevel::Debug.passes(LoggingLevel::Info));
        assert_eq!(LoggingLevel::default(), LoggingLevel::Info);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARNING".parse::<LoggingLevel>().unwrap(), LoggingLevel::Warning);
        assert!("verbose".parse::<LoggingLevel>().is_err());
    }

    #[test]
    fn test_message_params_wire_shape() {
        let params = LoggingMessageParams::new(LoggingLevel::Notice, json!({"step": 2}))
            .with_logger("calculator");
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            json!({"level": "notice", "logger": "calculator", "data": {"step": 2}})
        );
    }
}
