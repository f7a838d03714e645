//! Network-free fakes for driving the conversation loop in tests.
//!
//! - [`MockTransport`] replays queued HTTP responses and records every
//!   request it was asked to send.
//! - [`MockAdapter`] speaks a minimal JSON protocol, so the loop can be
//!   exercised without any real provider crate.
//!
//! Available with the `test-utils` feature, and always in this crate's own
//! tests.
//!
//! # The mock protocol
//!
//! A non-streaming response is one JSON object:
//!
//! ```json
//! {"content": "text", "tool_calls": [{"id": "1", "name": "add", "arguments": "{}"}],
//!  "usage": {"input_tokens": 3, "output_tokens": 1}}
//! ```
//!
//! A streaming response is newline-delimited JSON, one fragment per line:
//! `{"delta": "..."}`, `{"reasoning": "..."}`,
//! `{"tool_call": {"index": 0, "id": "...", "name": "...", "arguments": "..."}}`,
//! `{"usage": {...}}` and finally `{"done": true}`.
//!
//! ```rust
//! use llm_converse::mock::{MockResponse, MockTransport};
//!
//! let transport = MockTransport::new();
//! transport
//!     .queue(MockResponse::tool_calls(&[("call_1", "add", r#"{"a":1,"b":2}"#)]))
//!     .queue(MockResponse::text("3"));
//! assert_eq!(transport.pending(), 2);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::chat::{ChatResponse, ContentPart, ImageRef, ToolCallInfo, ToolResultInfo, Usage};
use crate::config::{DEFAULT_MAX_TOOL_RESULT_LEN, ResolvedConfig};
use crate::error::LlmError;
use crate::event::{ConverseEvent, EventSink};
use crate::provider::{
    HttpRequest, ProviderAdapter, ProviderKind, RequestParts, StructuredOutputMode, join_url,
};
use crate::stream::{Framing, ToolCallAccumulator, read_frames};
use crate::transport::HttpTransport;

// ── MockTransport ───────────────────────────────────────────────────

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    chunks: Vec<Vec<u8>>,
    delay: Option<Duration>,
}

impl MockResponse {
    /// A response with the given status and body.
    pub fn raw(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            chunks: vec![body.into()],
            delay: None,
        }
    }

    /// A 200 response whose body arrives in the given network chunks.
    pub fn chunked<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            status: 200,
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: None,
        }
    }

    /// A 200 response with a JSON body.
    pub fn json(body: &Value) -> Self {
        Self::raw(200, body.to_string())
    }

    /// A final mock-protocol answer.
    pub fn text(content: &str) -> Self {
        Self::json(&json!({ "content": content }))
    }

    /// A mock-protocol turn requesting `(id, name, arguments)` calls.
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Self {
        let calls: Vec<Value> = calls
            .iter()
            .map(|(id, name, arguments)| json!({"id": id, "name": name, "arguments": arguments}))
            .collect();
        Self::json(&json!({ "content": "", "tool_calls": calls }))
    }

    /// Waits `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn into_response(self) -> reqwest::Response {
        let chunks = self
            .chunks
            .into_iter()
            .map(Ok::<_, std::io::Error>);
        let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks));
        let mut response = http::Response::new(body);
        *response.status_mut() =
            http::StatusCode::from_u16(self.status).unwrap_or(http::StatusCode::OK);
        reqwest::Response::from(response)
    }
}

/// A queue-based [`HttpTransport`] fake.
///
/// Each `send` pops the front of the queue. Every request is recorded for
/// later assertion via [`requests`](Self::requests). An empty queue yields
/// an [`LlmError::Http`] without a status.
#[derive(Default, Clone)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("pending", &self.pending())
            .field("recorded", &self.requests().len())
            .finish()
    }
}

impl MockTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one response.
    pub fn queue(&self, response: MockResponse) -> &Self {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(response);
        self
    }

    /// Responses not yet consumed.
    pub fn pending(&self) -> usize {
        self.responses.lock().expect("mock lock poisoned").len()
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("mock lock poisoned").clone()
    }
}

impl HttpTransport for MockTransport {
    fn send(
        &self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<reqwest::Response, LlmError>> + Send + '_>> {
        self.requests
            .lock()
            .expect("mock lock poisoned")
            .push(request);
        let next = self
            .responses
            .lock()
            .expect("mock lock poisoned")
            .pop_front();
        Box::pin(async move {
            let Some(response) = next else {
                return Err(LlmError::Http {
                    status: None,
                    message: "MockTransport: no queued response".into(),
                });
            };
            if let Some(delay) = response.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(response.into_response())
        })
    }
}

// ── MockAdapter ─────────────────────────────────────────────────────

/// Adapter for the mock protocol described in the module docs.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    name: String,
    structured_output: StructuredOutputMode,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    /// Creates an adapter registered as `"mock"`.
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Creates an adapter registered under `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            structured_output: StructuredOutputMode::ResponseFormat,
        }
    }

    /// Overrides the structured-output mode the adapter reports.
    #[must_use]
    pub fn with_structured_output(mut self, mode: StructuredOutputMode) -> Self {
        self.structured_output = mode;
        self
    }
}

/// A resolved config pointing at the `"mock"` adapter.
pub fn mock_config() -> ResolvedConfig {
    ResolvedConfig {
        provider: "mock".into(),
        kind: ProviderKind::Custom("mock".into()),
        endpoint: "http://mock.invalid".into(),
        model: "mock-model".into(),
        credential: None,
        max_iterations: None,
        temperature: None,
        max_tokens: None,
        stream: false,
        timeout: None,
        max_tool_result_len: Some(DEFAULT_MAX_TOOL_RESULT_LEN),
        system: None,
    }
}

#[derive(Deserialize)]
struct MockBody {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallInfo>>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct MockFragment {
    delta: Option<String>,
    reasoning: Option<String>,
    tool_call: Option<MockCallFragment>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct MockCallFragment {
    index: u32,
    id: Option<String>,
    name: Option<String>,
    arguments: Option<String>,
}

impl ProviderAdapter for MockAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom(self.name.clone())
    }

    fn structured_output(&self) -> StructuredOutputMode {
        self.structured_output
    }

    fn build_request(&self, parts: &RequestParts<'_>) -> Result<HttpRequest, LlmError> {
        let mut headers = http::HeaderMap::new();
        if let Some(key) = parts.credential {
            let value = HeaderValue::from_str(key).map_err(|_| {
                LlmError::InvalidRequest("API key contains invalid header characters".into())
            })?;
            headers.insert(HeaderName::from_static("x-mock-key"), value);
        }

        let mut body = json!({
            "model": parts.model,
            "messages": self.format_messages(parts.messages, parts.system_images),
            "tools": parts.tools,
            "stream": parts.stream,
        });
        if let Some(system) = parts.system {
            body["system"] = json!(system);
        }
        if let Some(t) = parts.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(max) = parts.max_tokens {
            body["max_tokens"] = json!(max);
        }
        if let Some(schema) = parts.schema {
            body["schema"] = schema.clone();
        }

        Ok(HttpRequest {
            url: join_url(parts.endpoint, "/mock/chat"),
            headers,
            body,
        })
    }

    fn format_user_message(&self, content: &[ContentPart], prepended_images: &[ImageRef]) -> Value {
        let parts: Vec<Value> = prepended_images
            .iter()
            .map(|image| json!({ "image": image.as_str() }))
            .chain(content.iter().map(|part| match part {
                ContentPart::Text(text) => json!({ "text": text }),
                ContentPart::Image(image) => json!({ "image": image.as_str() }),
            }))
            .collect();
        json!({ "role": "user", "content": parts })
    }

    fn format_assistant_message(&self, text: &str, tool_calls: &[ToolCallInfo]) -> Value {
        json!({ "role": "assistant", "content": text, "tool_calls": tool_calls })
    }

    fn format_tool_results(&self, results: &[ToolResultInfo]) -> Vec<Value> {
        vec![json!({ "role": "tool", "results": results })]
    }

    fn parse_response<'a>(
        &'a self,
        response: reqwest::Response,
        stream: bool,
        sink: &'a dyn EventSink,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            if !stream {
                let raw = response.text().await.map_err(|e| LlmError::Http {
                    status: None,
                    message: e.to_string(),
                })?;
                let body: MockBody =
                    serde_json::from_str(&raw).map_err(|e| LlmError::ResponseFormat {
                        message: e.to_string(),
                        raw: raw.clone(),
                    })?;
                if body.content.is_none() && body.tool_calls.is_none() {
                    return Err(LlmError::ResponseFormat {
                        message: "response has neither content nor tool_calls".into(),
                        raw,
                    });
                }
                let content = body.content.unwrap_or_default();
                if !content.is_empty() {
                    sink.emit(&ConverseEvent::TextDelta(content.clone()));
                }
                let mut calls = ToolCallAccumulator::new();
                for (index, call) in (0u32..).zip(body.tool_calls.unwrap_or_default()) {
                    calls.apply(
                        index,
                        Some(call.id.as_str()),
                        Some(call.name.as_str()),
                        Some(call.arguments.as_str()),
                    );
                }
                return Ok(ChatResponse {
                    content,
                    tool_calls: calls.finish(),
                    usage: body.usage,
                });
            }

            let mut content = String::new();
            let mut calls = ToolCallAccumulator::new();
            let mut usage = Usage::default();
            read_frames(response, Framing::JsonLines, |frame| {
                let fragment: MockFragment = serde_json::from_str(&frame.data)?;
                if let Some(delta) = fragment.delta {
                    sink.emit(&ConverseEvent::TextDelta(delta.clone()));
                    content.push_str(&delta);
                }
                if let Some(reasoning) = fragment.reasoning {
                    sink.emit(&ConverseEvent::ReasoningDelta(reasoning));
                }
                if let Some(call) = fragment.tool_call {
                    calls.apply(
                        call.index,
                        call.id.as_deref(),
                        call.name.as_deref(),
                        call.arguments.as_deref(),
                    );
                }
                if let Some(u) = fragment.usage {
                    usage = u;
                }
                Ok(())
            })
            .await?;

            Ok(ChatResponse {
                content,
                tool_calls: calls.finish(),
                usage,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::chat::ChatMessage;

    #[tokio::test]
    async fn test_transport_replays_in_order_and_records() {
        let transport = MockTransport::new();
        transport
            .queue(MockResponse::text("one"))
            .queue(MockResponse::raw(500, "boom"));

        let req = HttpRequest {
            url: "http://mock/x".into(),
            headers: http::HeaderMap::new(),
            body: json!({"n": 1}),
        };
        let first = transport.send(req.clone()).await.unwrap();
        assert_eq!(first.status(), 200);
        let second = transport.send(req.clone()).await.unwrap();
        assert_eq!(second.status(), 500);
        assert!(transport.send(req).await.is_err());
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_adapter_stream_and_single_shot_agree() {
        let adapter = MockAdapter::new();
        let single = MockResponse::json(&json!({
            "content": "Hello",
            "tool_calls": [{"id": "c1", "name": "add", "arguments": "{\"a\":1}"}]
        }))
        .into_response();
        let streamed = MockResponse::chunked([
            "{\"delta\":\"Hel\"}\n{\"tool_call\":{\"index\":0,\"id\":\"c1\",\"name\":\"add\",",
            "\"arguments\":\"{\\\"a\\\"\"}}\n{\"delta\":\"lo\"}\n",
            "{\"tool_call\":{\"index\":0,\"arguments\":\":1}\"}}\n{\"done\":true}\n",
        ])
        .into_response();

        let a = adapter.parse_response(single, false, &()).await.unwrap();
        let b = adapter.parse_response(streamed, true, &()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(b.tool_calls[0].arguments, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_adapter_reports_reasoning_separately() {
        let adapter = MockAdapter::new();
        let events = Mutex::new(Vec::new());
        let sink = |e: &ConverseEvent| events.lock().unwrap().push(e.clone());
        let streamed = MockResponse::chunked([
            "{\"reasoning\":\"thinking...\"}\n{\"delta\":\"answer\"}\n",
        ])
        .into_response();

        let response = adapter.parse_response(streamed, true, &sink).await.unwrap();
        assert_eq!(response.content, "answer");
        let events = events.into_inner().unwrap();
        assert_eq!(events[0], ConverseEvent::ReasoningDelta("thinking...".into()));
        assert_eq!(events[1], ConverseEvent::TextDelta("answer".into()));
    }

    #[tokio::test]
    async fn test_adapter_rejects_empty_envelope() {
        let adapter = MockAdapter::new();
        let err = adapter
            .parse_response(MockResponse::json(&json!({})).into_response(), false, &())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ResponseFormat { .. }));

        // An empty answer is not malformed.
        let ok = adapter
            .parse_response(MockResponse::text("").into_response(), false, &())
            .await
            .unwrap();
        assert_eq!(ok.content, "");
    }

    #[test]
    fn test_build_request_shape() {
        let adapter = MockAdapter::new();
        let messages = [ChatMessage::user("hi")];
        let mut parts = RequestParts::new("http://localhost:1/", "m", &messages);
        parts.credential = Some("secret");
        parts.system = Some("be brief");
        let req = adapter.build_request(&parts).unwrap();
        assert_eq!(req.url, "http://localhost:1/mock/chat");
        assert_eq!(req.headers["x-mock-key"], "secret");
        assert_eq!(req.body["system"], "be brief");
        assert_eq!(req.body["messages"][0]["content"][0]["text"], "hi");
    }
}
