//! MCP Resources Protocol Types

use serde::{Deserialize, Serialize};

use crate::content::ResourceContents;
use crate::meta::{Cursor, PaginatedResult};

/// A URI-addressed resource the server exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Resource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            title: None,
            description: None,
            mime_type: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// RFC 6570 template describing a family of resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceTemplate {
    pub fn new(uri_template: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesResult {
    pub resources: Vec<Resource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

impl PaginatedResult for ListResourcesResult {
    type Item = Resource;

    fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    fn into_items(self) -> Vec<Resource> {
        self.resources
    }

    fn from_page(resources: Vec<Resource>, next_cursor: Option<Cursor>) -> Self {
        Self {
            resources,
            next_cursor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResourceTemplatesResult {
    pub resource_templates: Vec<ResourceTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

impl PaginatedResult for ListResourceTemplatesResult {
    type Item = ResourceTemplate;

    fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    fn into_items(self) -> Vec<ResourceTemplate> {
        self.resource_templates
    }

    fn from_page(resource_templates: Vec<ResourceTemplate>, next_cursor: Option<Cursor>) -> Self {
        Self {
            resource_templates,
            next_cursor,
        }
    }
}

/// Params naming a single resource, shared by read, subscribe and unsubscribe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUriParams {
    pub uri: String,
}

impl ResourceUriParams {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_result_omits_missing_cursor() {
        let page = ListResourcesResult::from_page(vec![Resource::new("file:///a", "a")], None);
        let value = serde_json::to_value(&page).unwrap();
        assert!(value.get("nextCursor").is_none());
        assert_eq!(value["resources"][0]["uri"], "file:///a");
    }

    #[test]
    fn test_templates_use_camel_case() {
        let page = ListResourceTemplatesResult::from_page(
            vec![ResourceTemplate::new("file:///{path}", "files")],
            Some(Cursor("c".into())),
        );
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["resourceTemplates"][0]["uriTemplate"], "file:///{path}");
        assert_eq!(value["nextCursor"], "c");
    }

    #[test]
    fn test_read_result_parses_mixed_contents() {
        let result: ReadResourceResult = serde_json::from_value(json!({
            "contents": [
                {"uri": "file:///a", "mimeType": "text/plain", "text": "hello"},
                {"uri": "file:///b", "blob": "AAAA"}
            ]
        }))
        .unwrap();
        assert_eq!(result.contents.len(), 2);
    }
}
