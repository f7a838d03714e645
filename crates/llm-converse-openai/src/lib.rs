//! `OpenAI`-compatible adapter for `llm-converse`.
//!
//! Speaks the Chat Completions protocol: `POST {endpoint}/chat/completions`
//! with `Authorization: Bearer <key>`, function tools, SSE streaming
//! terminated by `data: [DONE]`, and structured output through a strict
//! `response_format` JSON schema.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use llm_converse::{AdapterRegistry, Conversation, ConverseConfig};
//!
//! # async fn example() -> Result<(), llm_converse::LlmError> {
//! let mut registry = AdapterRegistry::new();
//! llm_converse_openai::register(&mut registry);
//!
//! let config = ConverseConfig {
//!     provider: Some("openai".into()),
//!     model: Some("gpt-4o-mini".into()),
//!     api_key: std::env::var("OPENAI_API_KEY").ok(),
//!     ..Default::default()
//! }
//! .resolve()?;
//!
//! let output = Conversation::from_registry(config, &registry)?
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

pub use config::{CHAT_PATH, DEFAULT_ENDPOINT, OpenAiOptions};
pub use provider::OpenAiAdapter;

/// Registers a default [`OpenAiAdapter`] under `"openai"`.
pub fn register(registry: &mut AdapterRegistry) {
    registry.register(Arc::new(OpenAiAdapter::default()));
}
