//! Anthropic Messages API adapter for `llm-converse`.
//!
//! Requests go to `POST {endpoint}/messages` with `x-api-key` and
//! `anthropic-version` headers. The system prompt is a top-level field,
//! tool results travel as `tool_result` blocks inside a user turn, and
//! structured output is produced by forcing the store tool through
//! `tool_choice`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_converse::{Conversation, ConverseConfig};
//! use llm_converse_anthropic::AnthropicAdapter;
//!
//! # async fn example() -> Result<(), llm_converse::LlmError> {
//! let config = ConverseConfig {
//!     provider: Some("anthropic".into()),
//!     model: Some("claude-sonnet-4-20250514".into()),
//!     api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
//!     ..Default::default()
//! }
//! .resolve()?;
//!
//! let output = Conversation::new(config, Arc::new(AnthropicAdapter::default()))
//!     .run("Say hello")
//!     .await?;
//! println!("{}", output.value);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod convert;
mod provider;
mod stream;
mod types;

use std::sync::Arc;

use llm_converse::AdapterRegistry;

pub use config::{API_VERSION, AnthropicOptions, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, MESSAGES_PATH};
pub use provider::AnthropicAdapter;

/// Registers a default [`AnthropicAdapter`] under `"anthropic"`.
pub fn register(registry: &mut AdapterRegistry) {
    registry.register(Arc::new(AnthropicAdapter::default()));
}
