//! `ping` and the empty payloads shared by parameterless methods.

use serde::{Deserialize, Serialize};

/// Params of a method that takes none. Absent params decode as this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyParams {}

/// Result of a method that returns nothing, serialized as `{}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyResult {}
