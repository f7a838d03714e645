//! Tool error type.

/// Error returned by a tool invocation.
///
/// Never escapes the loop: the dispatcher renders it into the tool result
/// as `{"error": "<message>"}` so the model can react to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Human-readable error description.
    pub message: String,
}

impl ToolError {
    /// Creates a new tool error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<crate::error::LlmError> for ToolError {
    fn from(err: crate::error::LlmError) -> Self {
        Self::new(err.to_string())
    }
}
