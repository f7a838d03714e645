//! The public conversation manager.
//!
//! A [`Conversation`] binds a resolved configuration to one adapter and one
//! transport, then runs prompts to completion:
//!
//! - [`run`](Conversation::run) returns the model's final text.
//! - [`run_structured`](Conversation::run_structured) returns a value
//!   validated against a schema, using whichever structured-output
//!   mechanism the adapter supports.
//! - [`run_capture`](Conversation::run_capture) returns whatever the model
//!   stored through a [`Store`] tool.
//!
//! Every run returns the full history alongside the value, so a follow-up
//! prompt can continue from it with [`with_history`](Conversation::with_history).
//!
//! ```rust,no_run
//! # async fn demo(adapter: std::sync::Arc<dyn llm_converse::ProviderAdapter>)
//! # -> Result<(), llm_converse::LlmError> {
//! use llm_converse::{Conversation, ResolvedConfig};
//! use llm_converse::tool::ToolBuilder;
//!
//! let config = ResolvedConfig::new("openai", "gpt-4o")?;
//! let add = ToolBuilder::new("add")
//!     .param("a", serde_json::json!({"type": "number"}))
//!     .param("b", serde_json::json!({"type": "number"}))
//!     .sync_handler(|args| {
//!         let a: f64 = args.value(0)?;
//!         let b: f64 = args.value(1)?;
//!         Ok(serde_json::json!(a + b))
//!     });
//!
//! let output = Conversation::new(config, adapter)
//!     .with_tool(add)
//!     .run("What is 2 + 3?")
//!     .await?;
//! println!("{} after {} round-trips", output.value, output.iterations);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use crate::chat::{ChatMessage, Usage};
use crate::config::ResolvedConfig;
use crate::error::LlmError;
use crate::event::EventSink;
use crate::loop_core::{CaptureProbe, LoopCore, LoopDeps, LoopExit};
use crate::prompt::{AssembledPrompt, Prompt, SystemPrompt};
use crate::provider::{AdapterRegistry, ProviderAdapter, StructuredOutputMode};
use crate::schema::ResolvedSchema;
use crate::store::Store;
use crate::tool::{Tool, ToolSet};
use crate::transport::{HttpTransport, ReqwestTransport};

/// The result of one prompt execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverseOutput<T> {
    /// Final text or validated structured value.
    pub value: T,
    /// Complete history, including the prompt and every tool exchange.
    pub history: Vec<ChatMessage>,
    /// Request/response round-trips performed.
    pub iterations: u32,
    /// Token usage summed over all round-trips.
    pub usage: Usage,
}

/// Runs prompts against one provider.
///
/// Runs take `&self`; each one works on its own copy of the starting
/// history, so a `Conversation` can be shared across tasks.
#[derive(Clone)]
pub struct Conversation {
    config: ResolvedConfig,
    adapter: Arc<dyn ProviderAdapter>,
    transport: Arc<dyn HttpTransport>,
    sink: Arc<dyn EventSink>,
    system: Option<SystemPrompt>,
    history: Vec<ChatMessage>,
    tools: ToolSet,
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("config", &self.config)
            .field("adapter", &self.adapter)
            .field("transport", &self.transport)
            .field("history_len", &self.history.len())
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl Conversation {
    /// Creates a conversation that sends through a default
    /// [`ReqwestTransport`] and discards events.
    pub fn new(config: ResolvedConfig, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let system = config.system.clone();
        Self {
            config,
            adapter,
            transport: Arc::new(ReqwestTransport::new()),
            sink: Arc::new(()),
            system,
            history: Vec::new(),
            tools: ToolSet::new(),
        }
    }

    /// Looks the adapter up by `config.provider`.
    pub fn from_registry(
        config: ResolvedConfig,
        registry: &AdapterRegistry,
    ) -> Result<Self, LlmError> {
        let adapter = registry.get(&config.provider)?;
        Ok(Self::new(config, adapter))
    }

    /// Replaces the HTTP transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Sends events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Starts every run from `history` instead of an empty one.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Replaces the configured system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<SystemPrompt>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Makes `tool` available on every run.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.register(tool);
        self
    }

    /// Makes every tool in `tools` available on every run.
    #[must_use]
    pub fn with_tools(mut self, tools: &ToolSet) -> Self {
        self.tools.extend(tools);
        self
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The starting history of every run.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Runs `prompt` until the model answers without tool calls.
    #[instrument(skip_all, fields(provider = %self.config.provider, model = %self.config.model))]
    pub async fn run(&self, prompt: impl Into<Prompt>) -> Result<ConverseOutput<String>, LlmError> {
        let (exit, finished) = self.drive(prompt.into(), None, None).await?;
        match exit {
            LoopExit::Text(text) => Ok(finished.output(text)),
            LoopExit::Captured => Err(capture_without_store()),
        }
    }

    /// Runs `prompt` and returns a value validated against `schema`.
    ///
    /// Adapters that accept a response-format or format-field directive
    /// receive the schema with every request and the final text is parsed
    /// as JSON. Adapters that only support forced tool use get a fresh
    /// [`Store`] registered for the run instead.
    ///
    /// Final text that is not JSON fails with [`LlmError::InvalidJson`];
    /// JSON that does not satisfy the schema fails with
    /// [`LlmError::SchemaValidation`].
    #[instrument(skip_all, fields(provider = %self.config.provider, model = %self.config.model))]
    pub async fn run_structured<T>(
        &self,
        prompt: impl Into<Prompt>,
        schema: &ResolvedSchema<T>,
    ) -> Result<ConverseOutput<T>, LlmError>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        match self.adapter.structured_output() {
            StructuredOutputMode::ForcedTool => {
                let store = Store::new(schema.clone())?;
                self.capture_with(prompt.into(), &store).await
            }
            StructuredOutputMode::ResponseFormat | StructuredOutputMode::FormatField => {
                let (exit, finished) = self
                    .drive(prompt.into(), Some(schema.json_schema()), None)
                    .await?;
                let value = match exit {
                    LoopExit::Text(text) => parse_final(&text, schema)?,
                    LoopExit::Captured => return Err(capture_without_store()),
                };
                Ok(finished.output(value))
            }
        }
    }

    /// Runs `prompt` with `store` registered as a tool and returns the
    /// value the model stores.
    ///
    /// The run ends as soon as the store is filled. If the model instead
    /// answers with plain text, that text is parsed against the store's
    /// schema.
    ///
    /// A store that already holds a value is rejected with
    /// [`LlmError::InvalidRequest`]; the loop would otherwise end on the
    /// stale value.
    #[instrument(skip_all, fields(provider = %self.config.provider, model = %self.config.model))]
    pub async fn run_capture<T>(
        &self,
        prompt: impl Into<Prompt>,
        store: &Store<T>,
    ) -> Result<ConverseOutput<T>, LlmError>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        self.capture_with(prompt.into(), store).await
    }

    async fn capture_with<T>(
        &self,
        prompt: Prompt,
        store: &Store<T>,
    ) -> Result<ConverseOutput<T>, LlmError>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        if store.is_filled() {
            return Err(LlmError::InvalidRequest(
                "store already holds a value; take() it or use a fresh store".into(),
            ));
        }
        let probe: &dyn CaptureProbe = store;
        let handle: Arc<dyn Tool> = Arc::new(store.handle());
        let (exit, finished) = self.drive(prompt, None, Some((probe, handle))).await?;
        let value = match exit {
            LoopExit::Captured => store.get().ok_or_else(|| LlmError::ResponseFormat {
                message: "store reported filled but holds no value".into(),
                raw: String::new(),
            })?,
            LoopExit::Text(text) => {
                tracing::debug!("model answered without calling the store tool");
                parse_final(&text, store.schema())?
            }
        };
        Ok(finished.output(value))
    }

    async fn drive(
        &self,
        prompt: Prompt,
        schema: Option<&Value>,
        capture: Option<(&dyn CaptureProbe, Arc<dyn Tool>)>,
    ) -> Result<(LoopExit, Finished), LlmError> {
        let AssembledPrompt {
            content,
            tools: prompt_tools,
        } = prompt.assemble();

        let mut tools = self.tools.clone();
        if let Some(system) = &self.system {
            tools.extend(&system.tools);
        }
        tools.extend(&prompt_tools);
        let probe = capture.map(|(probe, tool)| {
            tools.register_shared(tool);
            probe
        });

        let mut history = self.history.clone();
        history.push(ChatMessage::user(content));
        tracing::debug!(
            history_len = history.len(),
            tools = tools.len(),
            "starting conversation run"
        );

        let deps = LoopDeps {
            adapter: self.adapter.as_ref(),
            transport: self.transport.as_ref(),
            config: &self.config,
            system: self.system.as_ref().filter(|s| !s.is_empty()),
            tools: &tools,
            sink: self.sink.as_ref(),
            schema,
            capture: probe,
        };
        let mut core = LoopCore::new(deps, history);
        let exit = core.run().await?;
        let finished = Finished {
            iterations: core.iterations(),
            usage: core.usage(),
            history: core.into_history(),
        };
        Ok((exit, finished))
    }
}

struct Finished {
    history: Vec<ChatMessage>,
    iterations: u32,
    usage: Usage,
}

impl Finished {
    fn output<T>(self, value: T) -> ConverseOutput<T> {
        ConverseOutput {
            value,
            history: self.history,
            iterations: self.iterations,
            usage: self.usage,
        }
    }
}

fn capture_without_store() -> LlmError {
    LlmError::ResponseFormat {
        message: "run ended on a capture without a store".into(),
        raw: String::new(),
    }
}

/// Parses final assistant text as JSON and validates it.
fn parse_final<T: DeserializeOwned>(text: &str, schema: &ResolvedSchema<T>) -> Result<T, LlmError> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| LlmError::InvalidJson {
        message: e.to_string(),
        raw: text.to_owned(),
    })?;
    schema.parse(&value)
}
