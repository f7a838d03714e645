//! Ollama adapter for `llm-converse`.
//!
//! Talks to Ollama's native `POST {endpoint}/api/chat`. Streaming uses
//! newline-delimited JSON, images travel as a base64 side array, and
//! structured output puts the raw JSON Schema in the `format` field.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use llm_converse::{AdapterRegistry, Conversation, ConverseConfig};
//!
//! # async fn example() -> Result<(), llm_converse::LlmError> {
//! let mut registry = AdapterRegistry::new();
//! llm_converse_ollama::register(&mut registry);
//!
//! let config = ConverseConfig {
//!     provider: Some("ollama".into()),
//!     model: Some("llama3.2".into()),
//!     ..Default::default()
//! }
//! .resolve()?;
//!
//! let output = Conversation::from_registry(config, &registry)?
//!     .run("Why is the sky blue?")
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

pub use config::{CHAT_PATH, DEFAULT_ENDPOINT, OllamaOptions};
pub use provider::OllamaAdapter;

/// Registers a default [`OllamaAdapter`] under `"ollama"`.
pub fn register(registry: &mut AdapterRegistry) {
    registry.register(Arc::new(OllamaAdapter::default()));
}
