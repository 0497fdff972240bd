//! Content blocks carried by tool results, prompt messages and sampling.

use serde::{Deserialize, Serialize};

/// Speaker of a prompt or sampling message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Contents of a resource, either text or base64 binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    #[serde(rename_all = "camelCase")]
    Text {
        uri: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Blob {
        uri: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        blob: String,
    },
}

impl ResourceContents {
    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            uri: uri.into(),
            mime_type: Some("text/plain".to_string()),
            text: text.into(),
        }
    }

    pub fn blob(
        uri: impl Into<String>,
        mime_type: impl Into<String>,
        blob: impl Into<String>,
    ) -> Self {
        Self::Blob {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            blob: blob.into(),
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Text { uri, .. } | Self::Blob { uri, .. } => uri,
        }
    }
}

/// A single piece of content, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        data: String,
        mime_type: String,
    },
    #[serde(rename_all = "camelCase")]
    Audio {
        data: String,
        mime_type: String,
    },
    /// A resource embedded inline
    Resource {
        resource: ResourceContents,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_block_wire_shape() {
        let value = serde_json::to_value(ContentBlock::text("5")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "5"}));
    }

    #[test]
    fn test_image_block_uses_camel_case() {
        let value = serde_json::to_value(ContentBlock::image("AAAA", "image/png")).unwrap();
        assert_eq!(value["mimeType"], "image/png");
    }

    #[test]
    fn test_resource_contents_discriminated_by_field() {
        let text: ResourceContents =
            serde_json::from_value(json!({"uri": "file:///a", "text": "hi"})).unwrap();
        let blob: ResourceContents =
            serde_json::from_value(json!({"uri": "file:///b", "blob": "AAAA"})).unwrap();
        assert!(matches!(text, ResourceContents::Text { .. }));
        assert!(matches!(blob, ResourceContents::Blob { .. }));
        assert_eq!(blob.uri(), "file:///b");
    }
}
