//! Common re-exports.
//!
//! ```rust
//! use tandem_mcp_json_rpc::prelude::*;
//! ```

pub use crate::codec::{JsonRpcMessage, decode, decode_str, encode};
pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, ToJsonRpcError};
pub use crate::notification::JsonRpcNotification;
pub use crate::request::JsonRpcRequest;
pub use crate::response::{JsonRpcReply, JsonRpcResponse};
pub use crate::types::{JsonRpcVersion, Params, RequestId};

pub use crate::error_codes::*;
