//! Unified error type for conversation runs.
//!
//! Every adapter maps its wire-level failures into [`LlmError`], giving
//! callers a single type to match against regardless of which provider
//! is in use. Only the fatal conditions of a conversation surface here;
//! tool failures are absorbed into the conversation as tool results and
//! never reach the caller (see [`ToolError`](crate::tool::ToolError)).
//!
//! ```rust
//! use llm_converse::LlmError;
//!
//! fn describe(err: &LlmError) -> &'static str {
//!     match err {
//!         LlmError::Timeout { .. } => "the model took too long",
//!         LlmError::MaxIterations { .. } => "the model kept calling tools",
//!         LlmError::InvalidJson { .. } | LlmError::SchemaValidation { .. } => {
//!             "the final answer did not match the schema"
//!         }
//!         _ => "request failed",
//!     }
//! }
//! ```

use serde_json::Value;

/// The unified error type returned by conversation operations.
///
/// Variants are `#[non_exhaustive]`; always include a wildcard arm.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// An HTTP-level failure.
    ///
    /// For non-2xx responses `status` is set and `message` carries the raw
    /// response body. `status` is `None` when the request never received a
    /// response (DNS failure, connection reset, broken stream).
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// The HTTP status code, if one was received.
        status: Option<http::StatusCode>,
        /// Raw body text for status failures, transport description otherwise.
        message: String,
    },

    /// The request exceeded the configured timeout and was cancelled.
    #[error("Request timed out after {elapsed_ms}ms")]
    Timeout {
        /// The configured timeout that fired, in milliseconds.
        elapsed_ms: u64,
    },

    /// The response envelope could not be understood (no usable choice,
    /// undecodable body, oversized stream).
    #[error("Response format error: {message}")]
    ResponseFormat {
        /// What went wrong during parsing.
        message: String,
        /// The raw response body, for diagnostics.
        raw: String,
    },

    /// The model's final answer was expected to be JSON but was not.
    #[error("Failed to parse model output as JSON: {message}")]
    InvalidJson {
        /// The JSON parser's message.
        message: String,
        /// The unparsable content as returned by the model.
        raw: String,
    },

    /// A structured value failed schema validation.
    #[error("Schema validation error: {message}")]
    SchemaValidation {
        /// Validator messages, joined with `; `.
        message: String,
        /// The parsed value that failed validation.
        actual: Value,
    },

    /// The conversation used up its iteration budget.
    #[error("Maximum iterations ({limit}) reached without a final answer")]
    MaxIterations {
        /// The configured iteration cap.
        limit: u32,
    },

    /// The request could not be built (bad header characters, malformed
    /// tool schema, unsupported content for the provider).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No adapter is registered under the requested selector.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Configuration could not be resolved.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Returns `true` for the timeout variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the HTTP status for transport failures that received one.
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}
