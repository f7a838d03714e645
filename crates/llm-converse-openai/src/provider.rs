//! `OpenAI`-compatible [`ProviderAdapter`] implementation.

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

use crate::config::{CHAT_PATH, OpenAiOptions};
use crate::convert;
use crate::stream;
use crate::types::Response;

/// Adapter for the `OpenAI` Chat Completions protocol.
///
/// Works with any server exposing `/chat/completions` in the same shape:
/// vLLM, LM Studio, llama.cpp server, `OpenRouter` and others.
///
/// ```rust
/// use std::sync::Arc;
/// use llm_converse::AdapterRegistry;
/// use llm_converse_openai::OpenAiAdapter;
///
/// let mut registry = AdapterRegistry::new();
/// registry.register(Arc::new(OpenAiAdapter::default()));
/// assert!(registry.contains("openai"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpenAiAdapter {
    options: OpenAiOptions,
}

impl OpenAiAdapter {
    /// Creates an adapter with explicit options.
    pub fn new(options: OpenAiOptions) -> Self {
        Self { options }
    }

    /// The options in effect.
    pub fn options(&self) -> &OpenAiOptions {
        &self.options
    }

    fn headers(&self, credential: Option<&str>) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = credential.filter(|k| !k.is_empty()) {
            headers.insert(
                http::header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                    LlmError::InvalidRequest("API key contains invalid header characters".into())
                })?,
            );
        }
        if let Some(org) = &self.options.organization {
            headers.insert(
                "openai-organization",
                HeaderValue::from_str(org).map_err(|_| {
                    LlmError::InvalidRequest(
                        "Organization ID contains invalid header characters".into(),
                    )
                })?,
            );
        }
        Ok(headers)
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiCompatible
    }

    fn structured_output(&self) -> StructuredOutputMode {
        StructuredOutputMode::ResponseFormat
    }

    fn build_request(&self, parts: &RequestParts<'_>) -> Result<HttpRequest, LlmError> {
        let history = self.format_messages(parts.messages, parts.system_images);
        let body = convert::build_request(parts, &self.options, history);
        Ok(HttpRequest {
            url: join_url(parts.endpoint, CHAT_PATH),
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
            let parsed: Response =
                serde_json::from_str(&raw).map_err(|e| LlmError::ResponseFormat {
                    message: format!("Failed to parse OpenAI response: {e}"),
                    raw: raw.clone(),
                })?;
            let reasoning = parsed
                .choices
                .first()
                .and_then(|c| c.message.reasoning_content.clone());
            let chat = convert::convert_response(parsed, &raw)?;

            if let Some(reasoning) = reasoning.filter(|r| !r.is_empty()) {
                sink.emit(&ConverseEvent::ReasoningDelta(reasoning));
            }
            if !chat.content.is_empty() {
                sink.emit(&ConverseEvent::TextDelta(chat.content.clone()));
            }
            Ok(chat)
        })
    }
}
