//! Tool return values and their canonical string form.

use std::fmt;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::ToolError;

/// Sentinel result for tools that return nothing.
pub const UNIT_RESULT: &str = "OK";

/// What a tool hands back to the loop.
///
/// Every variant canonicalizes to the string sent to the model:
///
/// | Variant | Canonical form |
/// |---------|----------------|
/// | `Unit`, `Json(Null)` | `"OK"` |
/// | `Text(s)`, `Json(String(s))` | `s` unchanged |
/// | `Json(v)` | `v` serialized |
/// | `Items`, `Stream` | drained into a JSON array, serialized |
pub enum ToolReturn {
    /// No value.
    Unit,
    /// Plain text, passed through untouched.
    Text(String),
    /// Any JSON value.
    Json(Value),
    /// A lazy sequence, fully drained.
    Items(Box<dyn Iterator<Item = Value> + Send>),
    /// An async sequence, fully drained.
    Stream(Pin<Box<dyn Stream<Item = Value> + Send>>),
}

impl ToolReturn {
    /// Serializes any value into [`ToolReturn::Json`].
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Wraps an iterator.
    pub fn items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::Items(Box::new(items.into_iter()))
    }

    /// Wraps an async stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Produces the canonical string, draining sequences first.
    pub async fn canonicalize(self) -> String {
        match self {
            Self::Unit | Self::Json(Value::Null) => UNIT_RESULT.to_owned(),
            Self::Text(text) | Self::Json(Value::String(text)) => text,
            Self::Json(value) => value.to_string(),
            Self::Items(items) => Value::Array(items.collect()).to_string(),
            Self::Stream(stream) => Value::Array(stream.collect().await).to_string(),
        }
    }
}

impl fmt::Debug for ToolReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Items(_) => f.write_str("Items(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<()> for ToolReturn {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

impl From<String> for ToolReturn {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolReturn {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for ToolReturn {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Option<Value>> for ToolReturn {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Unit, Self::Json)
    }
}
