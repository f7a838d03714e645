//! # llm-converse
//!
//! A provider-agnostic tool-calling conversation loop for LLM chat APIs.
//!
//! Hand a [`Conversation`] a prompt and a set of tools and it drives the
//! exchange to completion: send the history, parse the reply, run any
//! requested tools, append their results, and repeat until the model
//! answers in plain text, a [`Store`](store::Store) tool captures a
//! structured result, or the iteration cap is hit.
//!
//! The loop never speaks a wire protocol itself. Each provider family is a
//! [`ProviderAdapter`] living in a sibling crate:
//!
//! | Crate | Protocol | Structured output |
//! |-------|----------|-------------------|
//! | `llm-converse-openai` | `OpenAI`-compatible `/chat/completions` | `response_format` |
//! | `llm-converse-anthropic` | Anthropic `/messages` | forced store tool |
//! | `llm-converse-ollama` | Ollama `/api/chat` | `format` field |
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────────┐ ┌─────────────────────┐ ┌──────────────────┐
//!  │ llm-converse-    │ │ llm-converse-       │ │ llm-converse-    │
//!  │ openai           │ │ anthropic           │ │ ollama           │
//!  └────────┬─────────┘ └──────────┬──────────┘ └────────┬─────────┘
//!           └───────────┬──────────┴──────────┬──────────┘
//!                       ▼                     ▼
//!            ┌─────────────────────────────────────────┐
//!            │              llm-converse               │
//!            │ Conversation ─► LoopCore ─► ToolSet      │
//!            │      │              │                    │
//!            │      ▼              ▼                    │
//!            │ AdapterRegistry  HttpTransport           │
//!            └─────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chat`] | Messages, content parts, tool calls, responses |
//! | [`config`] | Layered configuration and env loading |
//! | [`conversation`] | The [`Conversation`] manager |
//! | [`error`] | Unified [`LlmError`] |
//! | [`event`] | Progress events and sinks |
//! | [`prompt`] | Prompt templates with embedded tools and images |
//! | [`provider`] | The [`ProviderAdapter`] trait and [`AdapterRegistry`] |
//! | [`schema`] | Flat and rich output schemas |
//! | [`store`] | Structured-output capture through a tool call |
//! | [`stream`] | SSE / JSON-lines framing and tool-call accumulation |
//! | [`tool`] | Tool definitions, argument mapping, execution |
//! | [`transport`] | The HTTP seam and timeout handling |

#![warn(missing_docs)]

pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
mod loop_core;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod store;
pub mod stream;
pub mod tool;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// ── Core re-exports ────────────────────────────────────────────────

pub use chat::{ChatMessage, ChatResponse, ImageRef, MessageContent, ToolCallInfo, ToolResultInfo, Usage};
pub use config::{ConverseConfig, ResolvedConfig};
pub use conversation::{Conversation, ConverseOutput};
pub use error::LlmError;
pub use event::{ConverseEvent, EventSink};
pub use prompt::{Prompt, SystemPrompt};
pub use provider::{AdapterRegistry, ProviderAdapter, ProviderKind, StructuredOutputMode};
pub use schema::ResolvedSchema;
pub use store::Store;
pub use tool::{Tool, ToolBuilder, ToolSet};
