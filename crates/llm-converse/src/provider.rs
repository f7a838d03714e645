//! Provider adapter contract and the selector registry.
//!
//! A [`ProviderAdapter`] translates between the provider-agnostic model in
//! [`chat`](crate::chat) and one concrete wire protocol. It never performs
//! I/O on its own: [`build_request`](ProviderAdapter::build_request)
//! produces an [`HttpRequest`] that the loop hands to an
//! [`HttpTransport`](crate::transport::HttpTransport), and
//! [`parse_response`](ProviderAdapter::parse_response) consumes the
//! resulting `reqwest::Response`.
//!
//! The trait is object-safe (futures are boxed) so adapters can live in an
//! [`AdapterRegistry`] keyed by selector string:
//!
//! ```rust,ignore
//! let mut registry = AdapterRegistry::new();
//! llm_converse_openai::register(&mut registry);
//! llm_converse_anthropic::register(&mut registry);
//! let adapter = registry.get("anthropic")?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use http::HeaderMap;
use serde_json::Value;

use crate::chat::{ChatMessage, ChatResponse, ContentPart, ImageRef, ToolCallInfo, ToolResultInfo};
use crate::error::LlmError;
use crate::event::EventSink;
use crate::tool::ToolMetadata;

/// The closed set of built-in wire protocols, open for extension through
/// [`Custom`](ProviderKind::Custom).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// `OpenAI` Chat Completions and compatible servers.
    OpenAiCompatible,
    /// Anthropic Messages API.
    AnthropicStyle,
    /// Ollama `/api/chat`.
    OllamaStyle,
    /// A caller-registered adapter.
    Custom(String),
}

impl ProviderKind {
    /// The selector string this kind registers under.
    pub fn as_str(&self) -> &str {
        match self {
            Self::OpenAiCompatible => "openai",
            Self::AnthropicStyle => "anthropic",
            Self::OllamaStyle => "ollama",
            Self::Custom(name) => name,
        }
    }

    /// Base URL used when the configuration names none.
    pub fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::OpenAiCompatible => Some("https://api.openai.com/v1"),
            Self::AnthropicStyle => Some("https://api.anthropic.com/v1"),
            Self::OllamaStyle => Some("http://localhost:11434"),
            Self::Custom(_) => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Self::OpenAiCompatible,
            "anthropic" => Self::AnthropicStyle,
            "ollama" => Self::OllamaStyle,
            _ => Self::Custom(s.to_owned()),
        })
    }
}

/// How a provider expresses "answer with JSON matching this schema".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredOutputMode {
    /// A `response_format` object carrying the schema.
    ResponseFormat,
    /// A forced tool choice on the store tool.
    ForcedTool,
    /// A `format` field carrying the raw schema.
    FormatField,
}

/// Everything an adapter needs to build one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    /// Base URL without the provider path suffix.
    pub endpoint: &'a str,
    /// API key, if any.
    pub credential: Option<&'a str>,
    /// Model identifier.
    pub model: &'a str,
    /// Conversation so far.
    pub messages: &'a [ChatMessage],
    /// Tools the model may call.
    pub tools: &'a [ToolMetadata],
    /// Whether to request a streamed response.
    pub stream: bool,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Output token limit.
    pub max_tokens: Option<u32>,
    /// System prompt text.
    pub system: Option<&'a str>,
    /// System prompt images, prepended to the first user turn.
    pub system_images: &'a [ImageRef],
    /// JSON Schema the final answer must satisfy.
    pub schema: Option<&'a Value>,
}

impl<'a> RequestParts<'a> {
    /// Creates parts with only the required fields set.
    pub fn new(endpoint: &'a str, model: &'a str, messages: &'a [ChatMessage]) -> Self {
        Self {
            endpoint,
            credential: None,
            model,
            messages,
            tools: &[],
            stream: false,
            temperature: None,
            max_tokens: None,
            system: None,
            system_images: &[],
            schema: None,
        }
    }
}

/// A fully built HTTP request, ready for the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Absolute URL including the provider path suffix.
    pub url: String,
    /// Auth and protocol headers. `content-type` is added by the transport.
    pub headers: HeaderMap,
    /// JSON request body.
    pub body: Value,
}

/// Translates the internal conversation model to and from one wire protocol.
pub trait ProviderAdapter: Send + Sync + fmt::Debug {
    /// Which protocol this adapter speaks.
    fn kind(&self) -> ProviderKind;

    /// How this provider receives a structured-output directive.
    fn structured_output(&self) -> StructuredOutputMode;

    /// Builds the HTTP request for one round-trip.
    fn build_request(&self, parts: &RequestParts<'_>) -> Result<HttpRequest, LlmError>;

    /// Formats a user turn. `prepended_images` come from the system prompt
    /// and go before the turn's own parts.
    fn format_user_message(&self, content: &[ContentPart], prepended_images: &[ImageRef])
    -> Value;

    /// Formats an assistant turn with zero or more pending tool calls.
    fn format_assistant_message(&self, text: &str, tool_calls: &[ToolCallInfo]) -> Value;

    /// Formats the results of one round-trip's tool calls, batched or one
    /// message per result as the provider expects.
    fn format_tool_results(&self, results: &[ToolResultInfo]) -> Vec<Value>;

    /// Reads a successful response to the end.
    ///
    /// Text and reasoning fragments are reported to `sink` as they arrive.
    fn parse_response<'a>(
        &'a self,
        response: reqwest::Response,
        stream: bool,
        sink: &'a dyn EventSink,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, LlmError>> + Send + 'a>>;

    /// Formats a whole history.
    ///
    /// Consecutive tool results are handed to
    /// [`format_tool_results`](Self::format_tool_results) as one batch, and
    /// `system_images` are prepended to the first user turn.
    fn format_messages(&self, history: &[ChatMessage], system_images: &[ImageRef]) -> Vec<Value> {
        let mut out = Vec::with_capacity(history.len());
        let mut batch: Vec<ToolResultInfo> = Vec::new();
        let mut images = system_images;

        for message in history {
            if let ChatMessage::Tool(result) = message {
                batch.push(result.clone());
                continue;
            }
            if !batch.is_empty() {
                out.extend(self.format_tool_results(&batch));
                batch.clear();
            }
            match message {
                ChatMessage::User { content } => {
                    out.push(self.format_user_message(&content.to_parts(), images));
                    images = &[];
                }
                ChatMessage::Assistant {
                    content,
                    tool_calls,
                } => out.push(self.format_assistant_message(content, tool_calls)),
                ChatMessage::Tool(_) => {}
            }
        }
        if !batch.is_empty() {
            out.extend(self.format_tool_results(&batch));
        }
        out
    }
}

/// Maps selector strings to adapter instances.
///
/// Registration is explicit; there is no process-wide instance. A later
/// registration under the same selector replaces the earlier one.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.adapters.keys().collect();
        names.sort();
        f.debug_struct("AdapterRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its kind's selector.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) -> &mut Self {
        let selector = adapter.kind().as_str().to_ascii_lowercase();
        self.register_as(selector, adapter)
    }

    /// Registers an adapter under an explicit selector.
    pub fn register_as(
        &mut self,
        selector: impl Into<String>,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> &mut Self {
        let selector = selector.into().to_ascii_lowercase();
        if self.adapters.insert(selector.clone(), adapter).is_some() {
            tracing::debug!(%selector, "replaced registered adapter");
        }
        self
    }

    /// Looks up an adapter by selector, case-insensitively.
    ///
    /// `"openai-compatible"` is accepted as an alias of `"openai"`.
    pub fn get(&self, selector: &str) -> Result<Arc<dyn ProviderAdapter>, LlmError> {
        let key = selector.to_ascii_lowercase();
        let key = match key.parse::<ProviderKind>() {
            Ok(ProviderKind::Custom(_)) | Err(_) => key,
            Ok(kind) => kind.as_str().to_owned(),
        };
        self.adapters
            .get(&key)
            .cloned()
            .ok_or_else(|| LlmError::UnknownProvider(selector.to_owned()))
    }

    /// Returns `true` if an adapter is registered under `selector`.
    pub fn contains(&self, selector: &str) -> bool {
        self.get(selector).is_ok()
    }

    /// Registered selectors, sorted.
    pub fn selectors(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Joins a base URL and a path suffix, tolerating a trailing slash.
pub fn join_url(endpoint: &str, suffix: &str) -> String {
    format!("{}{suffix}", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageContent;
    use crate::mock::MockAdapter;

    #[test]
    fn test_provider_kind_selectors() {
        assert_eq!(ProviderKind::OpenAiCompatible.as_str(), "openai");
        assert_eq!(
            "Anthropic".parse::<ProviderKind>().unwrap(),
            ProviderKind::AnthropicStyle
        );
        assert_eq!(
            "openai-compatible".parse::<ProviderKind>().unwrap(),
            ProviderKind::OpenAiCompatible
        );
        assert_eq!(
            "my-llm".parse::<ProviderKind>().unwrap(),
            ProviderKind::Custom("my-llm".into())
        );
        assert!(ProviderKind::Custom("x".into()).default_endpoint().is_none());
    }

    #[test]
    fn test_registry_lookup_and_unknown() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(MockAdapter::new()));
        assert!(registry.contains("mock"));
        assert!(registry.contains("MOCK"));

        let err = registry.get("nope").unwrap_err();
        assert!(matches!(err, LlmError::UnknownProvider(ref s) if s == "nope"));
    }

    #[test]
    fn test_registry_last_registration_wins() {
        let mut registry = AdapterRegistry::new();
        registry.register_as("openai", Arc::new(MockAdapter::new()));
        registry.register_as("openai", Arc::new(MockAdapter::named("second")));
        assert_eq!(registry.selectors(), vec!["openai"]);
        let adapter = registry.get("openai-compatible").unwrap();
        assert_eq!(adapter.kind(), ProviderKind::Custom("second".into()));
    }

    #[test]
    fn test_format_messages_batches_tool_results() {
        let adapter = MockAdapter::new();
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::Assistant {
                content: String::new(),
                tool_calls: vec![
                    ToolCallInfo {
                        id: "1".into(),
                        name: "a".into(),
                        arguments: "{}".into(),
                    },
                    ToolCallInfo {
                        id: "2".into(),
                        name: "b".into(),
                        arguments: "{}".into(),
                    },
                ],
            },
            ChatMessage::tool_result(ToolResultInfo {
                id: "1".into(),
                name: "a".into(),
                result: "x".into(),
            }),
            ChatMessage::tool_result(ToolResultInfo {
                id: "2".into(),
                name: "b".into(),
                result: "y".into(),
            }),
        ];
        // MockAdapter batches results into one message.
        let formatted = adapter.format_messages(&history, &[]);
        assert_eq!(formatted.len(), 3);
        assert_eq!(formatted[2]["results"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_format_messages_prepends_system_images_once() {
        let adapter = MockAdapter::new();
        let image = ImageRef::from_base64("image/png", "AAAA");
        let history = vec![
            ChatMessage::User {
                content: MessageContent::Text("first".into()),
            },
            ChatMessage::assistant("ok"),
            ChatMessage::user("second"),
        ];
        let formatted = adapter.format_messages(&history, std::slice::from_ref(&image));
        assert_eq!(formatted[0]["content"][0]["image"], image.as_str());
        assert_eq!(formatted[0]["content"][1]["text"], "first");
        assert_eq!(formatted[2]["content"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_join_url_trims_slash() {
        assert_eq!(
            join_url("http://localhost:11434/", "/api/chat"),
            "http://localhost:11434/api/chat"
        );
    }
}
