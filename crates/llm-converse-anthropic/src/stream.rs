//! SSE decoding for streamed Messages API responses.
//!
//! Anthropic names every event (`message_start`, `content_block_start`,
//! `content_block_delta`, `message_delta`, `message_stop`, `ping`,
//! `error`). The payload repeats the name in its `type` field, which is
//! what this module dispatches on.

use llm_converse::chat::{ChatResponse, Usage};
use llm_converse::error::LlmError;
use llm_converse::event::{ConverseEvent, EventSink};
use llm_converse::stream::{Frame, Framing, ToolCallAccumulator, read_frames};

use crate::types::{ResponseContent, StreamDelta, StreamEvent};

/// Accumulated state of one streamed response.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    content: String,
    calls: ToolCallAccumulator,
    usage: Usage,
    saw_message: bool,
    done: bool,
}

impl StreamState {
    /// Applies one SSE frame.
    pub(crate) fn apply(&mut self, frame: &Frame, sink: &dyn EventSink) -> Result<(), LlmError> {
        let data = frame.data.trim();
        if data.is_empty() || self.done {
            return Ok(());
        }

        let event: StreamEvent = serde_json::from_str(data).map_err(|e| LlmError::ResponseFormat {
            message: format!("invalid stream event: {e}"),
            raw: data.to_owned(),
        })?;

        match event.event_type.as_str() {
            "message_start" => {
                self.saw_message = true;
                if let Some(usage) = event.message.and_then(|m| m.usage) {
                    self.usage.input_tokens = usage.input_tokens.unwrap_or_default();
                    self.usage.output_tokens = usage.output_tokens.unwrap_or_default();
                }
            }
            "content_block_start" => {
                self.saw_message = true;
                if let Some(block) = event.content_block {
                    self.start_block(event.index.unwrap_or_default(), block, sink);
                }
            }
            "content_block_delta" => {
                if let Some(delta) = event.delta {
                    self.apply_delta(event.index.unwrap_or_default(), delta, sink);
                }
            }
            "message_delta" => {
                if let Some(output) = event.usage.and_then(|u| u.output_tokens) {
                    self.usage.output_tokens = output;
                }
            }
            "message_stop" => self.done = true,
            "error" => {
                let message = event
                    .error
                    .map(|e| format!("{}: {}", e.error_type, e.message))
                    .unwrap_or_else(|| "stream error".into());
                return Err(LlmError::Http {
                    status: None,
                    message,
                });
            }
            // ping, content_block_stop and future event types
            _ => {}
        }
        Ok(())
    }

    fn start_block(&mut self, index: u32, block: ResponseContent, sink: &dyn EventSink) {
        match block.content_type.as_str() {
            "tool_use" => {
                self.calls
                    .apply(index, block.id.as_deref(), block.name.as_deref(), None);
            }
            "text" => {
                if let Some(text) = block.text.filter(|t| !t.is_empty()) {
                    self.push_text(text, sink);
                }
            }
            _ => {}
        }
    }

    fn apply_delta(&mut self, index: u32, delta: StreamDelta, sink: &dyn EventSink) {
        match delta.delta_type.as_deref() {
            Some("text_delta") => {
                if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                    self.push_text(text, sink);
                }
            }
            Some("input_json_delta") => {
                self.calls
                    .apply(index, None, None, delta.partial_json.as_deref());
            }
            Some("thinking_delta") => {
                if let Some(thinking) = delta.thinking.filter(|t| !t.is_empty()) {
                    sink.emit(&ConverseEvent::ReasoningDelta(thinking));
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: String, sink: &dyn EventSink) {
        self.content.push_str(&text);
        sink.emit(&ConverseEvent::TextDelta(text));
    }

    /// A `tool_use` block whose input never streamed any fragment still
    /// carries valid (empty) arguments.
    ///
    /// A stream that never started a message or a content block is a
    /// malformed envelope, not an empty answer.
    pub(crate) fn finish(self) -> Result<ChatResponse, LlmError> {
        if !self.saw_message {
            return Err(LlmError::ResponseFormat {
                message: "stream contained no message or content blocks".into(),
                raw: String::new(),
            });
        }
        if !self.done {
            tracing::debug!("stream ended without message_stop");
        }
        let mut tool_calls = self.calls.finish();
        for call in &mut tool_calls {
            if call.arguments.trim().is_empty() {
                call.arguments = "{}".into();
            }
        }
        Ok(ChatResponse {
            content: self.content,
            tool_calls,
            usage: self.usage,
        })
    }
}

/// Reads a streamed response to the end.
pub(crate) async fn collect(
    response: reqwest::Response,
    sink: &dyn EventSink,
) -> Result<ChatResponse, LlmError> {
    let mut state = StreamState::default();
    read_frames(response, Framing::Sse, |frame| state.apply(&frame, sink)).await?;
    state.finish()
}
