use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{JsonRpcVersion, Params, RequestId};

/// A JSON-RPC request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method: method.into(),
            params,
        }
    }

    /// Create a new request with no parameters
    pub fn new_no_params(id: RequestId, method: impl Into<String>) -> Self {
        Self::new(id, method, None)
    }

    /// Get a parameter by name
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new_no_params(RequestId::Number(1), "tools/list");

        let json = to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(!json.contains("params"));

        let parsed: JsonRpcRequest = from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_request_with_object_params() {
        let mut params = Params::new();
        params.insert("name".to_string(), json!("add"));
        params.insert("arguments".to_string(), json!({"a": 2, "b": 3}));

        let request = JsonRpcRequest::new(
            RequestId::String("req1".to_string()),
            "tools/call",
            Some(params),
        );

        assert_eq!(request.get_param("name"), Some(&json!("add")));
        assert_eq!(request.get_param("missing"), None);
    }
}
