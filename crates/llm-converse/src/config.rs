//! Conversation configuration.
//!
//! [`ConverseConfig`] is the layered, all-optional form: load it from a
//! file with serde, from `LLM_CONVERSE_*` environment variables, or build
//! it in code, then [`merge`](ConverseConfig::merge) layers together.
//! [`resolve`](ConverseConfig::resolve) fills defaults once and produces
//! the immutable [`ResolvedConfig`] a conversation runs with.
//!
//! ```rust
//! use llm_converse::config::ConverseConfig;
//!
//! let file = ConverseConfig {
//!     provider: Some("anthropic".into()),
//!     model: Some("claude-sonnet-4-20250514".into()),
//!     ..Default::default()
//! };
//! let overrides = ConverseConfig {
//!     max_iterations: Some(5),
//!     ..Default::default()
//! };
//! let resolved = file.merge(overrides).resolve().unwrap();
//! assert_eq!(resolved.endpoint, "https://api.anthropic.com/v1");
//! assert_eq!(resolved.max_iterations, Some(5));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::LlmError;
use crate::prompt::SystemPrompt;
use crate::provider::ProviderKind;

/// Default cap on tool-result length, in characters.
pub const DEFAULT_MAX_TOOL_RESULT_LEN: usize = 100_000;

/// Prefix of the environment variables read by [`ConverseConfig::from_env`].
pub const ENV_PREFIX: &str = "LLM_CONVERSE_";

/// Layered configuration; every field is optional.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverseConfig {
    /// Adapter selector (`"openai"`, `"anthropic"`, `"ollama"`, or custom).
    pub provider: Option<String>,
    /// Base URL without the provider path suffix.
    pub endpoint: Option<String>,
    /// Model identifier.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Round-trip cap. Unset means unbounded.
    pub max_iterations: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Output token limit per response.
    pub max_tokens: Option<u32>,
    /// Request streamed responses.
    pub stream: Option<bool>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Tool-result length cap in characters; `0` disables truncation.
    pub max_tool_result_len: Option<usize>,
    /// System prompt text.
    pub system: Option<String>,
}

impl fmt::Debug for ConverseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverseConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_iterations", &self.max_iterations)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_tool_result_len", &self.max_tool_result_len)
            .field("system", &self.system)
            .finish()
    }
}

impl ConverseConfig {
    /// Layers `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            provider: other.provider.or(self.provider),
            endpoint: other.endpoint.or(self.endpoint),
            model: other.model.or(self.model),
            api_key: other.api_key.or(self.api_key),
            max_iterations: other.max_iterations.or(self.max_iterations),
            temperature: other.temperature.or(self.temperature),
            max_tokens: other.max_tokens.or(self.max_tokens),
            stream: other.stream.or(self.stream),
            timeout_ms: other.timeout_ms.or(self.timeout_ms),
            max_tool_result_len: other.max_tool_result_len.or(self.max_tool_result_len),
            system: other.system.or(self.system),
        }
    }

    /// Reads `LLM_CONVERSE_*` environment variables.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which receives full variable
    /// names such as `LLM_CONVERSE_MODEL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
        };
        Ok(Self {
            provider: get("PROVIDER"),
            endpoint: get("ENDPOINT"),
            model: get("MODEL"),
            api_key: get("API_KEY"),
            max_iterations: parse_var("MAX_ITERATIONS", get("MAX_ITERATIONS"))?,
            temperature: parse_var("TEMPERATURE", get("TEMPERATURE"))?,
            max_tokens: parse_var("MAX_TOKENS", get("MAX_TOKENS"))?,
            stream: parse_var("STREAM", get("STREAM"))?,
            timeout_ms: parse_var("TIMEOUT_MS", get("TIMEOUT_MS"))?,
            max_tool_result_len: parse_var("MAX_TOOL_RESULT_LEN", get("MAX_TOOL_RESULT_LEN"))?,
            system: get("SYSTEM"),
        })
    }

    /// Fills defaults and freezes the configuration.
    ///
    /// The provider defaults to `openai` and the endpoint to the provider's
    /// public URL. A missing model, or a custom provider without an
    /// endpoint, is a [`LlmError::Config`].
    pub fn resolve(self) -> Result<ResolvedConfig, LlmError> {
        let provider = self.provider.unwrap_or_else(|| "openai".into());
        let kind = ProviderKind::from_str(&provider)
            .unwrap_or_else(|never| match never {});

        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => kind
                .default_endpoint()
                .map(str::to_owned)
                .ok_or_else(|| {
                    LlmError::Config(format!("no endpoint configured for provider {provider}"))
                })?,
        };
        let model = self
            .model
            .ok_or_else(|| LlmError::Config("no model configured".into()))?;

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(LlmError::Config(format!(
                    "temperature {t} outside 0.0..=2.0"
                )));
            }
        }

        if self.max_iterations == Some(0) {
            return Err(LlmError::Config("max_iterations must be at least 1".into()));
        }

        let max_tool_result_len = match self.max_tool_result_len {
            None => Some(DEFAULT_MAX_TOOL_RESULT_LEN),
            Some(0) => None,
            Some(n) => Some(n),
        };

        Ok(ResolvedConfig {
            provider,
            kind,
            endpoint,
            model,
            credential: self.api_key,
            max_iterations: self.max_iterations,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream.unwrap_or(false),
            timeout: self.timeout_ms.map(Duration::from_millis),
            max_tool_result_len,
            system: self.system.map(SystemPrompt::from),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, LlmError>
where
    T::Err: fmt::Display,
{
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|e| {
            LlmError::Config(format!("{ENV_PREFIX}{name}={value:?} is invalid: {e}"))
        })
    })
    .transpose()
}

/// Fully resolved configuration for one conversation run.
#[derive(Clone)]
pub struct ResolvedConfig {
    /// Adapter selector as configured.
    pub provider: String,
    /// Protocol family parsed from `provider`.
    pub kind: ProviderKind,
    /// Base URL without the provider path suffix.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// API key, if any.
    pub credential: Option<String>,
    /// Round-trip cap; `None` is unbounded.
    pub max_iterations: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Output token limit per response.
    pub max_tokens: Option<u32>,
    /// Request streamed responses.
    pub stream: bool,
    /// Per-request timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Tool-result length cap in characters; `None` is unbounded.
    pub max_tool_result_len: Option<usize>,
    /// System prompt.
    pub system: Option<SystemPrompt>,
}

impl ResolvedConfig {
    /// Creates a config for `provider` and `model` with every other field
    /// at its default.
    pub fn new(provider: &str, model: &str) -> Result<Self, LlmError> {
        ConverseConfig {
            provider: Some(provider.into()),
            model: Some(model.into()),
            ..ConverseConfig::default()
        }
        .resolve()
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .field("max_iterations", &self.max_iterations)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stream", &self.stream)
            .field("timeout", &self.timeout)
            .field("max_tool_result_len", &self.max_tool_result_len)
            .field("system", &self.system.as_ref().map(|s| &s.text))
            .finish()
    }
}
