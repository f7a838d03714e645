//! Provider-agnostic conversation model.
//!
//! A conversation is a list of [`ChatMessage`]s. Adapters translate these
//! into their wire format when building a request, and translate wire
//! responses back into a [`ChatResponse`]. History therefore survives a
//! provider switch: the same `Vec<ChatMessage>` can be replayed against
//! any adapter.
//!
//! # Invariant
//!
//! Every [`ToolCallInfo`] carried by an assistant message is followed by
//! exactly one [`ChatMessage::Tool`] result with the same id before the
//! next request is sent. Adapters that batch results into a single wire
//! message (Anthropic) still see one `Tool` message per call here.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The human side of the conversation.
    User,
    /// The model.
    Assistant,
    /// The result of a tool invocation.
    Tool,
}

/// An image passed by reference as a URL, usually a `data:` URL.
///
/// Encoding is the caller's concern; this type only splits a data URL
/// into media type and base64 payload for providers that want them
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wraps an image URL (`data:` or `http(s):`).
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Builds a `data:` URL from a media type and base64 payload.
    pub fn from_base64(media_type: &str, data: &str) -> Self {
        Self(format!("data:{media_type};base64,{data}"))
    }

    /// The full URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits a base64 `data:` URL into `(media_type, data)`.
    ///
    /// Returns `None` for remote URLs and non-base64 data URLs.
    pub fn as_base64(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let media_type = header.strip_suffix(";base64")?;
        Some((media_type, data))
    }
}

/// One element of multi-part user content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPart {
    /// A text segment.
    Text(String),
    /// An image reference.
    Image(ImageRef),
}

/// User message content: plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Ordered text and image parts.
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Returns the content as a list of parts.
    pub fn to_parts(&self) -> Vec<ContentPart> {
        match self {
            Self::Text(text) => vec![ContentPart::Text(text.clone())],
            Self::Parts(parts) => parts.clone(),
        }
    }

    /// Concatenates the text parts, ignoring images.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text(t) => Some(t.as_str()),
                    ContentPart::Image(_) => None,
                })
                .collect(),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A tool invocation requested by the model.
///
/// `arguments` is kept as the raw string the model produced; parsing
/// happens at dispatch time so malformed JSON can be reported back to
/// the model instead of failing the response parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    /// Correlation id, provider-assigned or loop-assigned.
    pub id: String,
    /// Name of the requested tool.
    pub name: String,
    /// Raw argument string, normally a JSON object.
    pub arguments: String,
}

/// The canonicalized outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultInfo {
    /// Id of the [`ToolCallInfo`] this answers.
    pub id: String,
    /// Name of the tool that ran (or was requested).
    pub name: String,
    /// Result text sent back to the model.
    pub result: String,
}

/// A single turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    /// A user turn.
    User {
        /// Text or multi-part content.
        content: MessageContent,
    },
    /// A model turn, possibly requesting tool calls.
    Assistant {
        /// Visible text, empty when the model only called tools.
        content: String,
        /// Pending tool calls, in the order the model issued them.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallInfo>,
    },
    /// The result of one tool call.
    Tool(ToolResultInfo),
}

impl ChatMessage {
    /// Creates a user message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Creates a tool-result message.
    pub fn tool_result(result: ToolResultInfo) -> Self {
        Self::Tool(result)
    }

    /// The author of this message.
    pub fn role(&self) -> ChatRole {
        match self {
            Self::User { .. } => ChatRole::User,
            Self::Assistant { .. } => ChatRole::Assistant,
            Self::Tool(_) => ChatRole::Tool,
        }
    }
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// One parsed model response, normalized across providers.
///
/// Streaming and non-streaming parses of the same logical answer produce
/// equal values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    /// Accumulated visible text.
    pub content: String,
    /// Complete tool calls (id and name present), in index order.
    pub tool_calls: Vec<ToolCallInfo>,
    /// Token usage, zero when the provider did not report it.
    pub usage: Usage,
}
