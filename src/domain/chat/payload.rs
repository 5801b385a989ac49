//! Opaque chat payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a chat message as the client sent it.
///
/// The relay never inspects or reshapes it; any schema belongs to the
/// clients. Cloning is cheap enough for fan-out at chat message sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatPayload(Value);

impl ChatPayload {
    /// Wraps an arbitrary JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the wrapped value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the payload, returning the wrapped value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ChatPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
