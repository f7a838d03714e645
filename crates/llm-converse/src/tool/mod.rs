//! Tools the model can call during a conversation.
//!
//! # Architecture
//!
//! ```text
//!   Tool              metadata (name, description, parameter schema) + call fn
//!     │
//!   ToolBuilder       declares ordered parameters and wraps a closure
//!     │
//!   ToolSet           tools by name, last registration wins
//!     │
//!   execute_calls()   positional dispatch, canonicalization, truncation
//! ```
//!
//! Arguments reach a tool **positionally**, in the order its parameters
//! were declared. The model's JSON key order never matters:
//!
//! ```rust
//! use llm_converse::tool::{ToolBuilder, ToolReturn};
//! use serde_json::json;
//!
//! let concat = ToolBuilder::new("concat")
//!     .description("Concatenate three strings")
//!     .param("first", json!({"type": "string"}))
//!     .param("second", json!({"type": "string"}))
//!     .param("third", json!({"type": "string"}))
//!     .sync_handler(|args| {
//!         let joined: String = args.iter().filter_map(|v| v.as_str()).collect();
//!         Ok(ToolReturn::Text(joined))
//!     });
//! # let _ = concat;
//! ```

mod args;
mod builder;
mod error;
mod execution;
mod output;
mod set;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use args::ToolArgs;
pub use builder::{FnTool, ToolBuilder};
pub use error::ToolError;
pub use execution::{TRUNCATION_MARKER, error_payload, execute_calls, truncate_result};
pub use output::ToolReturn;
pub use set::ToolSet;

/// Name, description, and parameter schema of a tool.
///
/// `parameters` is a JSON Schema object whose `properties` map lists the
/// parameters in declaration order. That order is authoritative for
/// positional dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Unique name the model uses to call the tool.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema for the argument object.
    pub parameters: Value,
}

impl ToolMetadata {
    /// Declared parameter names, in order.
    pub fn param_names(&self) -> Vec<&str> {
        self.parameters
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// A callable the conversation loop can dispatch to.
///
/// The trait is object-safe (uses boxed futures) so tools can be stored as
/// `Arc<dyn Tool>`. Most tools are built with [`ToolBuilder`]; implement
/// the trait directly for tools that carry their own state, like
/// [`Store`](crate::store::Store).
pub trait Tool: Send + Sync {
    /// Returns the tool's metadata.
    fn metadata(&self) -> &ToolMetadata;

    /// Invokes the tool with positional arguments.
    fn call(
        &self,
        args: ToolArgs,
    ) -> Pin<Box<dyn Future<Output = Result<ToolReturn, ToolError>> + Send + '_>>;
}

#[cfg(test)]
mod tests;
