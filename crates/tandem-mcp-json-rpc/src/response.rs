use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcErrorObject};
use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }

    /// Response carrying an empty object, as returned by `ping`
    pub fn empty(id: RequestId) -> Self {
        Self::new(id, Value::Object(Default::default()))
    }
}

impl From<(RequestId, Value)> for JsonRpcResponse {
    fn from((id, result): (RequestId, Value)) -> Self {
        Self::new(id, result)
    }
}

/// Either half of a response: exactly one of `result` or `error` is present on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    /// Successful response with result field
    Response(JsonRpcResponse),
    /// Error response with error field
    Error(JsonRpcError),
}

impl JsonRpcReply {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self::Response(JsonRpcResponse::new(id, result))
    }

    pub fn error(id: RequestId, error: JsonRpcErrorObject) -> Self {
        Self::Error(JsonRpcError::new(Some(id), error))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcReply::Error(_))
    }

    /// The id this reply answers. Only error replies to unparseable requests lack one.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcReply::Response(resp) => Some(&resp.id),
            JsonRpcReply::Error(err) => err.id.as_ref(),
        }
    }

    /// Split into the result value or the error object
    pub fn into_result(self) -> Result<Value, JsonRpcErrorObject> {
        match self {
            JsonRpcReply::Response(resp) => Ok(resp.result),
            JsonRpcReply::Error(err) => Err(err.error),
        }
    }
}

impl From<JsonRpcResponse> for JsonRpcReply {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcReply {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn test_response_serialization() {
        let response = JsonRpcResponse::new(RequestId::Number(1), json!({"tools": []}));

        let value = to_value(&response).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 1);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_empty_response_is_object() {
        let response = JsonRpcResponse::empty(RequestId::from("ping-1"));
        assert_eq!(to_value(&response).unwrap()["result"], json!({}));
    }

    #[test]
    fn test_reply_into_result() {
        let ok = JsonRpcReply::success(RequestId::Number(3), json!({"ok": true}));
        assert!(!ok.is_error());
        assert_eq!(ok.id(), Some(&RequestId::Number(3)));
        assert_eq!(ok.into_result().unwrap(), json!({"ok": true}));

        let err = JsonRpcReply::error(
            RequestId::Number(4),
            JsonRpcErrorObject::method_not_found("nope"),
        );
        assert!(err.is_error());
        assert_eq!(err.into_result().unwrap_err().code, -32601);
    }

    #[test]
    fn test_response_from_tuple() {
        let response: JsonRpcResponse = (RequestId::Number(1), json!({"test": true})).into();
        assert_eq!(response.id, RequestId::Number(1));
    }
}
