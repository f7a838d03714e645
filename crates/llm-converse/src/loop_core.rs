//! The conversation state machine.
//!
//! `LoopCore` owns the history of one run and drives it:
//!
//! ```text
//!   awaiting-response ──► response-received ──► no tool calls ──► done
//!          ▲                      │
//!          │                      ▼
//!          └──── tools-executed ◄── tool calls pending
//!                       │
//!                       └──► store filled ──► done (early exit)
//! ```
//!
//! One request is in flight at a time and tool calls run sequentially.
//! The iteration cap counts round-trips, not tool calls.

use std::time::Instant;

use serde_json::Value;

use crate::chat::{ChatMessage, ChatResponse, Usage};
use crate::config::ResolvedConfig;
use crate::error::LlmError;
use crate::event::{ConverseEvent, EventSink};
use crate::prompt::SystemPrompt;
use crate::provider::{ProviderAdapter, RequestParts};
use crate::tool::{ToolMetadata, ToolSet, execute_calls};
use crate::transport::{HttpTransport, check_status, with_timeout};

/// Lets the loop poll a structured-output slot without knowing its type.
pub(crate) trait CaptureProbe: Send + Sync {
    fn is_filled(&self) -> bool;
}

impl<T: Send> CaptureProbe for crate::store::Store<T> {
    fn is_filled(&self) -> bool {
        crate::store::Store::is_filled(self)
    }
}

/// Result of one round-trip.
#[derive(Debug)]
pub(crate) enum IterationOutcome {
    /// Tools ran; the model must be asked again.
    ToolsExecuted,
    /// The model answered without tool calls.
    Completed(String),
    /// The capture slot was filled by this round's tools.
    Captured,
}

/// How a finished run ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LoopExit {
    /// Final assistant text.
    Text(String),
    /// The capture slot holds the result.
    Captured,
}

/// Borrowed collaborators for one run.
pub(crate) struct LoopDeps<'a> {
    pub adapter: &'a dyn ProviderAdapter,
    pub transport: &'a dyn HttpTransport,
    pub config: &'a ResolvedConfig,
    pub system: Option<&'a SystemPrompt>,
    pub tools: &'a ToolSet,
    pub sink: &'a dyn EventSink,
    pub schema: Option<&'a Value>,
    pub capture: Option<&'a dyn CaptureProbe>,
}

pub(crate) struct LoopCore<'a> {
    deps: LoopDeps<'a>,
    definitions: Vec<ToolMetadata>,
    history: Vec<ChatMessage>,
    iterations: u32,
    usage: Usage,
}

impl<'a> LoopCore<'a> {
    pub(crate) fn new(deps: LoopDeps<'a>, history: Vec<ChatMessage>) -> Self {
        let definitions = deps.tools.definitions();
        Self {
            deps,
            definitions,
            history,
            iterations: 0,
            usage: Usage::default(),
        }
    }

    /// Runs iterations until the model answers, the capture slot fills,
    /// the cap is hit, or a fatal error occurs.
    pub(crate) async fn run(&mut self) -> Result<LoopExit, LlmError> {
        loop {
            match self.do_iteration().await? {
                IterationOutcome::Completed(text) => {
                    self.deps.sink.emit(&ConverseEvent::Done {
                        iterations: self.iterations,
                    });
                    return Ok(LoopExit::Text(text));
                }
                IterationOutcome::Captured => {
                    tracing::debug!(iterations = self.iterations, "structured output captured");
                    self.deps.sink.emit(&ConverseEvent::Done {
                        iterations: self.iterations,
                    });
                    return Ok(LoopExit::Captured);
                }
                IterationOutcome::ToolsExecuted => {
                    if let Some(limit) = self.deps.config.max_iterations {
                        if self.iterations >= limit {
                            tracing::warn!(limit, "iteration cap reached");
                            return Err(LlmError::MaxIterations { limit });
                        }
                    }
                }
            }
        }
    }

    /// One full round-trip: request, parse, and tool dispatch.
    pub(crate) async fn do_iteration(&mut self) -> Result<IterationOutcome, LlmError> {
        self.iterations += 1;
        self.deps.sink.emit(&ConverseEvent::IterationStart {
            iteration: self.iterations,
            message_count: self.history.len(),
        });

        let start = Instant::now();
        let response = self.request().await?;
        tracing::debug!(
            iteration = self.iterations,
            tool_calls = response.tool_calls.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "response received"
        );
        self.usage += response.usage;

        let ChatResponse {
            content,
            tool_calls,
            ..
        } = response;

        if tool_calls.is_empty() {
            self.history.push(ChatMessage::assistant(content.clone()));
            return Ok(IterationOutcome::Completed(content));
        }

        let results = execute_calls(
            self.deps.tools,
            &tool_calls,
            self.deps.sink,
            self.deps.config.max_tool_result_len,
        )
        .await;

        self.history.push(ChatMessage::Assistant {
            content,
            tool_calls,
        });
        self.history
            .extend(results.into_iter().map(ChatMessage::Tool));

        if self.deps.capture.is_some_and(|c| c.is_filled()) {
            return Ok(IterationOutcome::Captured);
        }
        Ok(IterationOutcome::ToolsExecuted)
    }

    async fn request(&self) -> Result<ChatResponse, LlmError> {
        let config = self.deps.config;
        let system = self.deps.system;
        let parts = RequestParts {
            endpoint: &config.endpoint,
            credential: config.credential.as_deref(),
            model: &config.model,
            messages: &self.history,
            tools: &self.definitions,
            stream: config.stream,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system: system.map(|s| s.text.as_str()).filter(|s| !s.is_empty()),
            system_images: system.map(|s| s.images.as_slice()).unwrap_or_default(),
            schema: self.deps.schema,
        };
        let request = self.deps.adapter.build_request(&parts)?;

        let adapter = self.deps.adapter;
        let transport = self.deps.transport;
        let sink = self.deps.sink;
        with_timeout(config.timeout, async move {
            let response = check_status(transport.send(request).await?).await?;
            adapter.parse_response(response, config.stream, sink).await
        })
        .await
    }

    pub(crate) fn iterations(&self) -> u32 {
        self.iterations
    }

    pub(crate) fn usage(&self) -> Usage {
        self.usage
    }

    pub(crate) fn into_history(self) -> Vec<ChatMessage> {
        self.history
    }
}
