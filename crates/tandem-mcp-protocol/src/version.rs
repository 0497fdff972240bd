//! MCP Protocol Version Support
//!
//! ## Version History
//! - **2024-11-05**: First published protocol revision
//! - **2025-03-26**: Tool annotations, audio content, completions capability
//! - **2025-06-18**: Titles on named entities, structured tool output

use serde::{Deserialize, Serialize};

/// Supported MCP protocol versions, ordered oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum McpVersion {
    #[serde(rename = "2024-11-05")]
    V2024_11_05,
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
    #[serde(rename = "2025-06-18")]
    V2025_06_18,
}

impl McpVersion {
    /// Every version this build can speak
    pub const ALL: [McpVersion; 3] = [
        McpVersion::V2024_11_05,
        McpVersion::V2025_03_26,
        McpVersion::V2025_06_18,
    ];

    /// The latest protocol version implemented by this crate
    pub const LATEST: McpVersion = McpVersion::V2025_06_18;

    /// Parse a version string like "2024-11-05"
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2024-11-05" => Some(McpVersion::V2024_11_05),
            "2025-03-26" => Some(McpVersion::V2025_03_26),
            "2025-06-18" => Some(McpVersion::V2025_06_18),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            McpVersion::V2024_11_05 => "2024-11-05",
            McpVersion::V2025_03_26 => "2025-03-26",
            McpVersion::V2025_06_18 => "2025-06-18",
        }
    }

    /// Whether `audio` content blocks may be sent
    pub fn supports_audio_content(&self) -> bool {
        *self >= McpVersion::V2025_03_26
    }

    /// Whether `structuredContent` may appear on tool results
    pub fn supports_structured_content(&self) -> bool {
        *self >= McpVersion::V2025_06_18
    }
}

impl std::fmt::Display for McpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for McpVersion {
    type Err = crate::McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::McpError::UnsupportedVersion(s.to_string()))
    }
}

impl Default for McpVersion {
    fn default() -> Self {
        Self::LATEST
    }
}
