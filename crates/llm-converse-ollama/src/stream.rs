//! JSON Lines decoding for streamed `/api/chat` responses.
//!
//! Ollama writes one complete JSON object per line. Content arrives in
//! pieces; tool calls arrive whole, usually in the final `done: true`
//! line together with the eval counts.

use llm_converse::chat::{ChatResponse, Usage};
use llm_converse::error::LlmError;
use llm_converse::event::{ConverseEvent, EventSink};
use llm_converse::stream::{Frame, Framing, ToolCallAccumulator, read_frames};

use crate::convert::{accrete_tool_calls, check_error, convert_usage};
use crate::types::Chunk;

#[derive(Debug, Default)]
pub(crate) struct StreamState {
    content: String,
    calls: ToolCallAccumulator,
    next_index: u32,
    usage: Usage,
    saw_message: bool,
    done: bool,
}

impl StreamState {
    /// Applies one line.
    pub(crate) fn apply(&mut self, frame: &Frame, sink: &dyn EventSink) -> Result<(), LlmError> {
        let data = frame.data.trim();
        if data.is_empty() || self.done {
            return Ok(());
        }

        let chunk: Chunk = serde_json::from_str(data).map_err(|e| LlmError::ResponseFormat {
            message: format!("invalid stream line: {e}"),
            raw: data.to_owned(),
        })?;
        check_error(&chunk)?;

        self.saw_message |= chunk.done || chunk.message.is_some();
        if chunk.done {
            self.done = true;
            self.usage = convert_usage(&chunk);
        }
        if let Some(message) = chunk.message {
            if let Some(thinking) = message.thinking.filter(|t| !t.is_empty()) {
                sink.emit(&ConverseEvent::ReasoningDelta(thinking));
            }
            if let Some(text) = message.content.filter(|t| !t.is_empty()) {
                self.content.push_str(&text);
                sink.emit(&ConverseEvent::TextDelta(text));
            }
            if let Some(calls) = message.tool_calls {
                self.next_index = accrete_tool_calls(&mut self.calls, calls, self.next_index);
            }
        }
        Ok(())
    }

    /// Fails when no line carried a message or the `done` marker.
    pub(crate) fn finish(self) -> Result<ChatResponse, LlmError> {
        if !self.saw_message {
            return Err(LlmError::ResponseFormat {
                message: "stream contained no message".into(),
                raw: String::new(),
            });
        }
        if !self.done {
            tracing::debug!("stream ended without done: true");
        }
        Ok(ChatResponse {
            content: self.content,
            tool_calls: self.calls.finish(),
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
    read_frames(response, Framing::JsonLines, |frame| state.apply(&frame, sink)).await?;
    state.finish()
}
