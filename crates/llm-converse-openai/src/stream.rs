//! SSE decoding for streamed `/chat/completions` responses.
//!
//! Each `data:` payload is a [`StreamChunk`]. Text and reasoning deltas
//! go to the event sink as they arrive; tool-call fragments accrete by
//! index until `data: [DONE]` or the end of the body.

use llm_converse::chat::{ChatResponse, Usage};
use llm_converse::error::LlmError;
use llm_converse::event::{ConverseEvent, EventSink};
use llm_converse::stream::{Frame, Framing, ToolCallAccumulator, read_frames};

use crate::convert::convert_usage;
use crate::types::StreamChunk;

/// Accumulated state of one streamed response.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    content: String,
    calls: ToolCallAccumulator,
    usage: Usage,
    saw_choice: bool,
    done: bool,
}

impl StreamState {
    /// Applies one SSE frame.
    pub(crate) fn apply(&mut self, frame: &Frame, sink: &dyn EventSink) -> Result<(), LlmError> {
        let data = frame.data.trim();
        if data.is_empty() || self.done {
            return Ok(());
        }
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| LlmError::ResponseFormat {
            message: format!("invalid stream chunk: {e}"),
            raw: data.to_owned(),
        })?;

        if let Some(choice) = chunk.choices.into_iter().next() {
            self.saw_choice = true;
            let delta = choice.delta;
            if let Some(reasoning) = delta.reasoning_content.filter(|r| !r.is_empty()) {
                sink.emit(&ConverseEvent::ReasoningDelta(reasoning));
            }
            if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
                self.content.push_str(&text);
                sink.emit(&ConverseEvent::TextDelta(text));
            }
            for call in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call
                    .function
                    .map_or((None, None), |f| (f.name, f.arguments));
                self.calls.apply(
                    call.index,
                    call.id.as_deref(),
                    name.as_deref(),
                    arguments.as_deref(),
                );
            }
        }

        if let Some(usage) = chunk.usage {
            self.usage = convert_usage(usage);
        }
        Ok(())
    }

    /// Fails when no chunk ever carried a choice: that is a malformed
    /// envelope rather than an empty answer.
    pub(crate) fn finish(self) -> Result<ChatResponse, LlmError> {
        if !self.saw_choice {
            return Err(LlmError::ResponseFormat {
                message: "stream contained no choices".into(),
                raw: String::new(),
            });
        }
        if !self.done {
            tracing::debug!("stream ended without [DONE]");
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
    read_frames(response, Framing::Sse, |frame| state.apply(&frame, sink)).await?;
    state.finish()
}
