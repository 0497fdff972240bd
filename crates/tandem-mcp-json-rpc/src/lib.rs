//! # JSON-RPC 2.0 message layer
//!
//! Transport-agnostic JSON-RPC 2.0 types plus a validating frame codec.
//! Dispatch lives one layer up, in the session engine; this crate only knows
//! how to turn frames into messages and back.
//!
//! ## Features
//! - Request, notification, response and error envelopes
//! - Strict decoding that classifies failures as parse or invalid-request errors
//! - Standard error codes and application error objects

pub mod codec;
pub mod error;
pub mod notification;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

pub use codec::{
    DecodeError, DecodeErrorKind, EncodeError, JsonRpcMessage, decode, decode_str, decode_value,
    encode, to_params,
};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, ToJsonRpcError};
pub use notification::JsonRpcNotification;
pub use request::JsonRpcRequest;
pub use response::{JsonRpcReply, JsonRpcResponse};
pub use types::{JsonRpcVersion, Params, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
