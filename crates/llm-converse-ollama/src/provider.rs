//! Ollama [`ProviderAdapter`] implementation.

use std::future::Future;
use std::pin::Pin;

use http::HeaderMap;
use llm_converse::chat::{ChatResponse, ContentPart, ImageRef, ToolCallInfo, ToolResultInfo};
use llm_converse::error::LlmError;
use llm_converse::event::{ConverseEvent, EventSink};
use llm_converse::provider::{
    HttpRequest, ProviderAdapter, ProviderKind, RequestParts, StructuredOutputMode, join_url,
};
use serde_json::Value;

use crate::config::{CHAT_PATH, OllamaOptions};
use crate::convert;
use crate::stream;
use crate::types::Chunk;

/// Adapter for Ollama's native `/api/chat` endpoint.
///
/// No authentication is sent. Structured output uses the `format` field,
/// which Ollama enforces through constrained decoding.
#[derive(Debug, Clone, Default)]
pub struct OllamaAdapter {
    options: OllamaOptions,
}

impl OllamaAdapter {
    /// Creates an adapter with explicit options.
    pub fn new(options: OllamaOptions) -> Self {
        Self { options }
    }

    /// The options in effect.
    pub fn options(&self) -> &OllamaOptions {
        &self.options
    }
}

impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OllamaStyle
    }

    fn structured_output(&self) -> StructuredOutputMode {
        StructuredOutputMode::FormatField
    }

    fn build_request(&self, parts: &RequestParts<'_>) -> Result<HttpRequest, LlmError> {
        if parts.credential.is_some() {
            tracing::debug!("ignoring API key; Ollama takes no authentication");
        }
        let history = self.format_messages(parts.messages, parts.system_images);
        let body = convert::build_request(parts, &self.options, history);
        Ok(HttpRequest {
            url: join_url(parts.endpoint, CHAT_PATH),
            headers: HeaderMap::new(),
            body: serde_json::to_value(body)?,
        })
    }

    fn format_user_message(&self, content: &[ContentPart], prepended_images: &[ImageRef]) -> Value {
        convert::user_message(content, prepended_images)
    }

    fn format_assistant_message(&self, text: &str, tool_calls: &[ToolCallInfo]) -> Value {
        convert::assistant_message(text, tool_calls)
    }

    fn format_tool_results(&self, results: &[ToolResultInfo]) -> Vec<Value> {
        convert::tool_messages(results)
    }

    fn parse_response<'a>(
        &'a self,
        response: reqwest::Response,
        stream: bool,
        sink: &'a dyn EventSink,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            if stream {
                return stream::collect(response, sink).await;
            }

            let raw = response.text().await.map_err(|e| LlmError::Http {
                status: None,
                message: format!("Failed to read response body: {e}"),
            })?;
            let parsed: Chunk = serde_json::from_str(&raw).map_err(|e| LlmError::ResponseFormat {
                message: format!("Failed to parse Ollama response: {e}"),
                raw: raw.clone(),
            })?;
            let (chat, reasoning) = convert::convert_response(parsed, &raw)?;

            if !reasoning.is_empty() {
                sink.emit(&ConverseEvent::ReasoningDelta(reasoning));
            }
            if !chat.content.is_empty() {
                sink.emit(&ConverseEvent::TextDelta(chat.content.clone()));
            }
            Ok(chat)
        })
    }
}

#[cfg(test)]
mod tests {
    use llm_converse::chat::ChatMessage;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_build_request_url_without_auth() {
        let messages = [ChatMessage::user("Hello")];
        let mut parts = RequestParts::new("http://localhost:11434/", "llama3.2", &messages);
        parts.credential = Some("unused");
        let req = OllamaAdapter::default().build_request(&parts).unwrap();

        assert_eq!(req.url, "http://localhost:11434/api/chat");
        assert!(req.headers.is_empty());
        assert_eq!(req.body["stream"], false);
        assert_eq!(req.body["messages"][0], json!({"role": "user", "content": "Hello"}));
    }

    #[test]
    fn test_history_formatting() {
        let messages = [
            ChatMessage::user("What is 2 + 3?"),
            ChatMessage::Assistant {
                content: String::new(),
                tool_calls: vec![ToolCallInfo {
                    id: "call_0".into(),
                    name: "add".into(),
                    arguments: r#"{"a":2,"b":3}"#.into(),
                }],
            },
            ChatMessage::tool_result(ToolResultInfo {
                id: "call_0".into(),
                name: "add".into(),
                result: "5".into(),
            }),
        ];
        let mut parts = RequestParts::new("http://localhost:11434", "llama3.2", &messages);
        parts.system = Some("Be exact.");
        parts.stream = true;
        let body = OllamaAdapter::default().build_request(&parts).unwrap().body;

        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["system", "user", "assistant", "tool"]);
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["arguments"]["b"], 3);
        assert_eq!(body["stream"], true);
    }
}
