//! Anthropic adapter defaults and options.

/// Public Anthropic API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1";

/// Path appended to the endpoint for every request.
pub const MESSAGES_PATH: &str = "/messages";

/// Value of the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

/// `max_tokens` sent when the conversation sets none; the API requires it.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Adapter-local settings.
///
/// ```rust
/// use llm_converse_anthropic::AnthropicOptions;
///
/// let options = AnthropicOptions {
///     thinking_budget: Some(2048),
///     ..Default::default()
/// };
/// assert_eq!(options.api_version, "2023-06-01");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnthropicOptions {
    /// `anthropic-version` header value.
    pub api_version: String,
    /// `max_tokens` used when the conversation config leaves it unset.
    pub default_max_tokens: u32,
    /// Enables extended thinking with this token budget.
    ///
    /// Ignored on requests that force the store tool: structured capture
    /// wins over thinking for those turns.
    pub thinking_budget: Option<u32>,
}

impl Default for AnthropicOptions {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.into(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            thinking_budget: None,
        }
    }
}
