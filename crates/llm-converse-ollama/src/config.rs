//! Ollama adapter defaults and options.

/// Local Ollama server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Path appended to the endpoint for every request.
pub const CHAT_PATH: &str = "/api/chat";

/// Adapter-local settings.
///
/// ```rust
/// use llm_converse_ollama::OllamaOptions;
///
/// let options = OllamaOptions {
///     think: Some(true),
///     keep_alive: Some("10m".into()),
/// };
/// assert_ne!(options, OllamaOptions::default());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OllamaOptions {
    /// Sent as `think`; reasoning models then return `message.thinking`.
    pub think: Option<bool>,
    /// How long the server keeps the model loaded (`"5m"`, `"0"`, ...).
    pub keep_alive: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_empty() {
        let options = OllamaOptions::default();
        assert!(options.think.is_none());
        assert!(options.keep_alive.is_none());
    }
}
