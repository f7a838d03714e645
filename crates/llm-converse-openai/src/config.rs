//! `OpenAI`-compatible adapter options.

/// Public `OpenAI` API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Path appended to the endpoint for every request.
pub const CHAT_PATH: &str = "/chat/completions";

/// Name given to the schema inside `response_format`.
pub const SCHEMA_NAME: &str = "output";

/// Adapter-local settings that do not belong in the shared config.
///
/// ```rust
/// use llm_converse_openai::OpenAiOptions;
///
/// let options = OpenAiOptions {
///     organization: Some("org-123".into()),
///     ..Default::default()
/// };
/// assert!(options.strict_schema);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiOptions {
    /// Sent as `OpenAI-Organization` when set.
    pub organization: Option<String>,
    /// Ask for strict schema adherence and close every object node with
    /// `additionalProperties: false`.
    pub strict_schema: bool,
    /// Request a final usage chunk when streaming. Some compatible servers
    /// reject `stream_options`.
    pub stream_usage: bool,
}

impl Default for OpenAiOptions {
    fn default() -> Self {
        Self {
            organization: None,
            strict_schema: true,
            stream_usage: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = OpenAiOptions::default();
        assert!(options.organization.is_none());
        assert!(options.strict_schema);
        assert!(options.stream_usage);
        assert_eq!(
            llm_converse::ProviderKind::OpenAiCompatible.default_endpoint(),
            Some(DEFAULT_ENDPOINT)
        );
    }
}
