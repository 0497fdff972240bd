//! Frame codec: turns one wire frame into a typed [`JsonRpcMessage`] and back.
//!
//! Decoding never trusts serde's untagged matching; the shape of the object is
//! checked field by field so every failure can be classified as either a parse
//! error (not JSON at all) or an invalid request (JSON, but not a legal
//! JSON-RPC 2.0 message).

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::{JsonRpcReply, JsonRpcResponse};
use crate::types::{Params, RequestId};

/// Any message that can travel in a single frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    /// Method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(req) => Some(&req.method),
            JsonRpcMessage::Notification(notif) => Some(&notif.method),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(req) => Some(&req.id),
            JsonRpcMessage::Notification(_) => None,
            JsonRpcMessage::Response(resp) => Some(&resp.id),
            JsonRpcMessage::Error(err) => err.id.as_ref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JsonRpcMessage::Request(_) => "request",
            JsonRpcMessage::Notification(_) => "notification",
            JsonRpcMessage::Response(_) => "response",
            JsonRpcMessage::Error(_) => "error",
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        Self::Notification(notification)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

impl From<JsonRpcReply> for JsonRpcMessage {
    fn from(reply: JsonRpcReply) -> Self {
        match reply {
            JsonRpcReply::Response(resp) => Self::Response(resp),
            JsonRpcReply::Error(err) => Self::Error(err),
        }
    }
}

/// Why a frame could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The frame is not valid JSON
    Parse,
    /// Valid JSON that is not a legal JSON-RPC 2.0 message
    InvalidRequest,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {message}", self.code().message())]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub message: String,
    /// Id of a request-shaped frame, when it could be read. Never set for
    /// response-shaped frames: answering a response would loop.
    pub id: Option<RequestId>,
}

impl DecodeError {
    fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: DecodeErrorKind::Parse,
            message: message.into(),
            id: None,
        }
    }

    fn invalid(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self {
            kind: DecodeErrorKind::InvalidRequest,
            message: message.into(),
            id,
        }
    }

    pub fn code(&self) -> JsonRpcErrorCode {
        match self.kind {
            DecodeErrorKind::Parse => JsonRpcErrorCode::ParseError,
            DecodeErrorKind::InvalidRequest => JsonRpcErrorCode::InvalidRequest,
        }
    }

    /// The error response to send back, if the offending request can be addressed
    pub fn to_error_response(&self) -> Option<JsonRpcError> {
        let id = self.id.clone()?;
        Some(JsonRpcError::new(
            Some(id),
            JsonRpcErrorObject::new(self.code(), Some(self.message.clone()), None),
        ))
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("encoded message contains a raw frame delimiter")]
    EmbeddedDelimiter,
}

/// Serialize a message into a single-line frame (no trailing delimiter).
pub fn encode(message: &JsonRpcMessage) -> Result<String, EncodeError> {
    let frame = serde_json::to_string(message)?;
    if frame.contains('\n') || frame.contains('\r') {
        return Err(EncodeError::EmbeddedDelimiter);
    }
    Ok(frame)
}

/// Decode one frame.
pub fn decode(frame: &[u8]) -> Result<JsonRpcMessage, DecodeError> {
    let value: Value =
        serde_json::from_slice(frame).map_err(|e| DecodeError::parse(e.to_string()))?;
    decode_value(value)
}

/// Decode one frame given as text.
pub fn decode_str(frame: &str) -> Result<JsonRpcMessage, DecodeError> {
    decode(frame.as_bytes())
}

/// Validate an already-parsed JSON value as a JSON-RPC message.
pub fn decode_value(value: Value) -> Result<JsonRpcMessage, DecodeError> {
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::invalid(None, "message must be a JSON object"));
    };

    let has_method = obj.contains_key("method");
    let raw_id = obj.remove("id");
    let id = raw_id.as_ref().and_then(RequestId::from_value);
    let reply_id = if has_method { id.clone() } else { None };

    match obj.remove("jsonrpc") {
        Some(Value::String(version)) if version == crate::JSONRPC_VERSION => {}
        _ => {
            return Err(DecodeError::invalid(
                reply_id,
                "jsonrpc field must be exactly \"2.0\"",
            ));
        }
    }

    let method = obj.remove("method");
    let params = obj.remove("params");
    let result = obj.remove("result");
    let error = obj.remove("error");

    if let Some(method) = method {
        let Value::String(method) = method else {
            return Err(DecodeError::invalid(reply_id, "method must be a string"));
        };
        if result.is_some() || error.is_some() {
            return Err(DecodeError::invalid(
                reply_id,
                "a request must not carry result or error",
            ));
        }
        let params = decode_params(params).map_err(|m| DecodeError::invalid(reply_id.clone(), m))?;

        return match (raw_id, id) {
            (None, _) => Ok(JsonRpcMessage::Notification(JsonRpcNotification::new(
                method, params,
            ))),
            (Some(_), Some(id)) => Ok(JsonRpcMessage::Request(JsonRpcRequest::new(
                id, method, params,
            ))),
            (Some(_), None) => Err(DecodeError::invalid(
                None,
                "request id must be a string or an integer",
            )),
        };
    }

    if params.is_some() {
        return Err(DecodeError::invalid(None, "a response must not carry params"));
    }

    match (result, error) {
        (Some(result), None) => {
            let id = id.ok_or_else(|| {
                DecodeError::invalid(None, "response id must be a string or an integer")
            })?;
            Ok(JsonRpcMessage::Response(JsonRpcResponse::new(id, result)))
        }
        (None, Some(error)) => {
            let error: JsonRpcErrorObject = serde_json::from_value(error)
                .map_err(|e| DecodeError::invalid(None, format!("malformed error object: {}", e)))?;
            match (raw_id, id) {
                (Some(Value::Null), _) => Ok(JsonRpcMessage::Error(JsonRpcError::new(None, error))),
                (Some(_), Some(id)) => {
                    Ok(JsonRpcMessage::Error(JsonRpcError::new(Some(id), error)))
                }
                _ => Err(DecodeError::invalid(
                    None,
                    "error response id must be a string, an integer or null",
                )),
            }
        }
        (Some(_), Some(_)) => Err(DecodeError::invalid(
            None,
            "a response must carry exactly one of result or error",
        )),
        (None, None) => Err(DecodeError::invalid(
            None,
            "message has neither a method nor a result or error",
        )),
    }
}

fn decode_params(params: Option<Value>) -> Result<Option<Params>, &'static str> {
    match params {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err("params must be an object"),
    }
}

/// Convert any serializable payload into named params. Empty payloads are omitted.
pub fn to_params<T: Serialize>(payload: &T) -> Result<Option<Params>, serde_json::Error> {
    match serde_json::to_value(payload)? {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Ok(Some(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Option<Params> {
        value.as_object().cloned()
    }

    #[test]
    fn test_decode_request() {
        let frame = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#;
        let msg = decode_str(frame).unwrap();
        match msg {
            JsonRpcMessage::Request(req) => {
                assert_eq!(req.id, RequestId::Number(1));
                assert_eq!(req.method, "tools/list");
                assert_eq!(req.params, Some(Params::new()));
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_notification_has_no_id() {
        let msg = decode_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Notification(_)));
        assert!(msg.id().is_none());
    }

    #[test]
    fn test_round_trip_all_variants() {
        let messages = vec![
            JsonRpcMessage::Request(JsonRpcRequest::new(
                RequestId::from("42"),
                "tools/call",
                params(json!({"name": "add", "arguments": {"a": 2, "b": 3}})),
            )),
            JsonRpcMessage::Notification(JsonRpcNotification::new(
                "notifications/progress",
                params(json!({"progressToken": "t", "progress": 1})),
            )),
            JsonRpcMessage::Response(JsonRpcResponse::new(
                RequestId::Number(7),
                json!({"content": [{"type": "text", "text": "5"}]}),
            )),
            JsonRpcMessage::Error(JsonRpcError::method_not_found(RequestId::Number(8), "x")),
            JsonRpcMessage::Error(JsonRpcError::parse_error(None, None)),
        ];

        for message in messages {
            let frame = encode(&message).unwrap();
            assert_eq!(decode_str(&frame).unwrap(), message);
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = decode_str("{not json").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Parse);
        assert_eq!(err.code().code(), -32700);
        assert!(err.to_error_response().is_none());
    }

    #[test]
    fn test_wrong_version_is_invalid_request_with_salvaged_id() {
        let err = decode_str(r#"{"jsonrpc":"1.0","id":5,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
        assert_eq!(err.id, Some(RequestId::Number(5)));

        let reply = err.to_error_response().unwrap();
        assert_eq!(reply.error.code, -32600);
        assert_eq!(reply.id, Some(RequestId::Number(5)));
    }

    #[test]
    fn test_null_request_id_is_rejected() {
        let err = decode_str(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
        assert!(err.id.is_none());
    }

    #[test]
    fn test_result_and_error_are_mutually_exclusive() {
        let err = decode_str(
            r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"code":-32603,"message":"x"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
        // Never answer a response-shaped frame
        assert!(err.to_error_response().is_none());

        let err = decode_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
    }

    #[test]
    fn test_request_with_result_is_invalid() {
        let frame = r#"{"jsonrpc":"2.0","id":"a","method":"ping","result":{}}"#;
        let err = decode_str(frame).unwrap_err();
        assert_eq!(err.id, Some(RequestId::from("a")));
    }

    #[test]
    fn test_array_params_are_rejected() {
        let frame = r#"{"jsonrpc":"2.0","id":2,"method":"ping","params":[1,2]}"#;
        let err = decode_str(frame).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
        assert_eq!(err.id, Some(RequestId::Number(2)));
    }

    #[test]
    fn test_non_object_is_invalid() {
        let err = decode_str("[1,2,3]").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::InvalidRequest);
    }

    #[test]
    fn test_to_params_omits_empty_payloads() {
        assert_eq!(to_params(&json!({})).unwrap(), None);
        assert_eq!(to_params(&Value::Null).unwrap(), None);
        assert_eq!(
            to_params(&json!({"uri": "file:///a"})).unwrap(),
            params(json!({"uri": "file:///a"}))
        );
        assert_eq!(to_params(&json!(3)).unwrap(), params(json!({"value": 3})));
    }

    #[test]
    fn test_encoded_newlines_are_escaped() {
        let message = JsonRpcMessage::Notification(JsonRpcNotification::new(
            "notifications/message",
            params(json!({"level": "info", "data": "line one\nline two"})),
        ));
        let frame = encode(&message).unwrap();
        assert!(!frame.contains('\n'));
        assert_eq!(decode_str(&frame).unwrap(), message);
    }
}
