//! MCP Roots Protocol Types

use serde::{Deserialize, Serialize};

/// A URI boundary the client suggests the server operate within
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Roots must currently be `file://` URIs
    pub fn validate(&self) -> Result<(), crate::McpError> {
        if !self.uri.starts_with("file://") {
            return Err(crate::McpError::InvalidParameters(format!(
                "root URI must start with 'file://': {}",
                self.uri
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListRootsResult {
    pub roots: Vec<Root>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_validation() {
        assert!(Root::new("file:///home/user/project").validate().is_ok());
        assert!(Root::new("https://example.com").validate().is_err());
    }

    #[test]
    fn test_root_name_optional() {
        let value = serde_json::to_value(Root::new("file:///tmp")).unwrap();
        assert!(value.get("name").is_none());
    }
}
