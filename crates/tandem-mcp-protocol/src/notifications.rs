//! Params of the protocol-level notifications.

use serde::{Deserialize, Serialize};
use tandem_mcp_json_rpc::RequestId;

use crate::meta::ProgressToken;

/// `notifications/cancelled`: advisory, never acknowledged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CancelledParams {
    pub fn new(request_id: RequestId, reason: Option<String>) -> Self {
        Self { request_id, reason }
    }
}

/// `notifications/progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressParams {
    pub fn new(progress_token: ProgressToken, progress: f64, total: Option<f64>) -> Self {
        Self {
            progress_token,
            progress,
            total,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// `notifications/resources/updated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}
