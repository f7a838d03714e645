//! Anthropic [`ProviderAdapter`] implementation.

use std::future::Future;
use std::pin::Pin;

use http::{HeaderMap, HeaderValue};
use llm_converse::chat::{ChatResponse, ContentPart, ImageRef, ToolCallInfo, ToolResultInfo};
use llm_converse::error::LlmError;
use llm_converse::event::{ConverseEvent, EventSink};
use llm_converse::provider::{
    HttpRequest, ProviderAdapter, ProviderKind, RequestParts, StructuredOutputMode, join_url,
};
use serde_json::Value;

use crate::config::{AnthropicOptions, MESSAGES_PATH};
use crate::convert;
use crate::stream;
use crate::types::Response;

/// Adapter for the Anthropic Messages API.
///
/// Structured output is obtained by forcing a call to the store tool, so
/// [`run_structured`](llm_converse::Conversation::run_structured) goes
/// through `tool_choice` rather than a response-format field.
#[derive(Debug, Clone, Default)]
pub struct AnthropicAdapter {
    options: AnthropicOptions,
}

impl AnthropicAdapter {
    /// Creates an adapter with explicit options.
    pub fn new(options: AnthropicOptions) -> Self {
        Self { options }
    }

    /// The options in effect.
    pub fn options(&self) -> &AnthropicOptions {
        &self.options
    }

    fn headers(&self, credential: Option<&str>) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = credential.filter(|k| !k.is_empty()) {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(key).map_err(|_| {
                    LlmError::InvalidRequest("API key contains invalid header characters".into())
                })?,
            );
        }
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&self.options.api_version).map_err(|_| {
                LlmError::InvalidRequest("API version contains invalid header characters".into())
            })?,
        );
        Ok(headers)
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AnthropicStyle
    }

    fn structured_output(&self) -> StructuredOutputMode {
        StructuredOutputMode::ForcedTool
    }

    fn build_request(&self, parts: &RequestParts<'_>) -> Result<HttpRequest, LlmError> {
        let messages = self.format_messages(parts.messages, parts.system_images);
        let body = convert::build_request(parts, &self.options, messages);
        Ok(HttpRequest {
            url: join_url(parts.endpoint, MESSAGES_PATH),
            headers: self.headers(parts.credential)?,
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
        vec![convert::tool_results_message(results)]
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
            let parsed: Response =
                serde_json::from_str(&raw).map_err(|e| LlmError::ResponseFormat {
                    message: format!("Failed to parse Anthropic response: {e}"),
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
    fn test_build_request_url_and_headers() {
        let messages = [ChatMessage::user("Hello")];
        let mut parts = RequestParts::new("https://api.anthropic.com/v1/", "claude", &messages);
        parts.credential = Some("sk-ant-test");
        let req = AnthropicAdapter::default().build_request(&parts).unwrap();

        assert_eq!(req.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(req.headers["x-api-key"], "sk-ant-test");
        assert_eq!(req.headers["anthropic-version"], "2023-06-01");
        assert!(req.headers.get("authorization").is_none());
        assert_eq!(req.body["messages"][0], json!({"role": "user", "content": "Hello"}));
    }

    #[test]
    fn test_bad_key_rejected() {
        let messages = [ChatMessage::user("Hello")];
        let mut parts = RequestParts::new("https://api.anthropic.com/v1", "claude", &messages);
        parts.credential = Some("bad\nkey");
        let err = AnthropicAdapter::default().build_request(&parts).unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_tool_results_share_one_user_turn() {
        let messages = [
            ChatMessage::user("Add twice"),
            ChatMessage::Assistant {
                content: String::new(),
                tool_calls: vec![
                    ToolCallInfo { id: "t1".into(), name: "add".into(), arguments: "{}".into() },
                    ToolCallInfo { id: "t2".into(), name: "add".into(), arguments: "{}".into() },
                ],
            },
            ChatMessage::tool_result(ToolResultInfo {
                id: "t1".into(),
                name: "add".into(),
                result: "1".into(),
            }),
            ChatMessage::tool_result(ToolResultInfo {
                id: "t2".into(),
                name: "add".into(),
                result: "2".into(),
            }),
        ];
        let mut parts = RequestParts::new("https://api.anthropic.com/v1", "claude", &messages);
        parts.system = Some("Be exact.");
        let body = AnthropicAdapter::default().build_request(&parts).unwrap().body;

        let turns = body["messages"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2]["role"], "user");
        assert_eq!(turns[2]["content"].as_array().unwrap().len(), 2);
        assert_eq!(body["system"], "Be exact.");
    }

    #[test]
    fn test_system_images_lead_first_user_turn() {
        let messages = [ChatMessage::user("Describe it")];
        let images = [ImageRef::from_base64("image/png", "iVBORw0KGgo=")];
        let mut parts = RequestParts::new("https://api.anthropic.com/v1", "claude", &messages);
        parts.system_images = &images;
        let body = AnthropicAdapter::default().build_request(&parts).unwrap().body;

        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1], json!({"type": "text", "text": "Describe it"}));
    }
}
