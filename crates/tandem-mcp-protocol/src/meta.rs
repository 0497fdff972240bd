//! `_meta`, progress tokens and pagination cursors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token correlating `notifications/progress` with a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    String(String),
    Number(i64),
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressToken::String(s) => write!(f, "{}", s),
            ProgressToken::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for ProgressToken {
    fn from(token: &str) -> Self {
        ProgressToken::String(token.to_string())
    }
}

impl From<String> for ProgressToken {
    fn from(token: String) -> Self {
        ProgressToken::String(token)
    }
}

impl From<i64> for ProgressToken {
    fn from(token: i64) -> Self {
        ProgressToken::Number(token)
    }
}

/// Request-side `_meta` object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,
}

impl RequestMeta {
    /// Read `_meta.progressToken` out of raw request params
    pub fn progress_token_of(
        params: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Option<ProgressToken> {
        let meta = params?.get("_meta")?;
        serde_json::from_value::<RequestMeta>(meta.clone())
            .ok()?
            .progress_token
    }
}

/// Opaque pagination cursor. Callers must not parse or construct one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Cursor {
    fn from(raw: String) -> Self {
        Cursor(raw)
    }
}

/// Params shared by every `*/list` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl PaginatedParams {
    pub fn first_page() -> Self {
        Self::default()
    }

    pub fn after(cursor: Cursor) -> Self {
        Self {
            cursor: Some(cursor),
        }
    }
}

/// A list result that may continue on another page
pub trait PaginatedResult: Sized {
    type Item;

    fn next_cursor(&self) -> Option<&Cursor>;

    fn into_items(self) -> Vec<Self::Item>;

    /// Build one page from already-sliced items
    fn from_page(items: Vec<Self::Item>, next_cursor: Option<Cursor>) -> Self;
}
