//! Provider configuration and per-call options.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Default `max_tokens` sent to Anthropic-style backends, which require the field.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretString)
    }
}

/// Wire dialect spoken by the backend.
#[derive(Debug, Copy, Clone, Deserialize, PartialEq, Eq)]
pub enum Dialect {
    #[serde(rename = "openai", alias = "OpenAI")]
    OpenAiLike,
    #[serde(rename = "anthropic", alias = "Anthropic")]
    AnthropicLike,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::OpenAiLike => f.write_str("OpenAI"),
            Dialect::AnthropicLike => f.write_str("Anthropic"),
        }
    }
}

/// Literal open/close text pair that some backends use to inline reasoning
/// inside plain content.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MarkerPair {
    pub open: String,
    pub close: String,
}

impl MarkerPair {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// The `<think>` / `</think>` pair used by most reasoning models.
    pub fn think() -> Self {
        Self::new("<think>", "</think>")
    }
}

/// HTTP-specific transport options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTransport {
    /// HTTP proxy URL
    #[serde(default)]
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    #[serde(default)]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpTransport {
    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Everything needed to talk to one backend.
///
/// Immutable for the duration of a call; the normalizer only reads it.
///
/// # Example
/// ```rust
/// use unichat::options::{Dialect, ProviderConfig};
///
/// let config = ProviderConfig::new(
///     Dialect::OpenAiLike,
///     "https://api.deepseek.com",
///     "sk-...",
///     "deepseek-reasoner",
/// )
/// .with_thinking(true);
///
/// assert!(config.inline_markers.is_some());
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "ProviderSettings")]
pub struct ProviderConfig {
    pub dialect: Dialect,

    /// Base URL, without the `/v1/...` path
    pub endpoint: String,

    pub api_key: SecretString,

    /// Model identifier (e.g., "gpt-4o", "claude-3-opus")
    pub model: String,

    /// Surface reasoning from backends that gate it (Anthropic-style)
    pub thinking_enabled: bool,

    /// Maximum tokens to generate; Anthropic-style requests fall back to [`DEFAULT_MAX_TOKENS`]
    pub max_tokens: Option<u32>,

    /// Markers scanned for in plain content; `None` disables scanning
    pub inline_markers: Option<MarkerPair>,

    pub transport: HttpTransport,
}

impl ProviderConfig {
    pub fn new(
        dialect: Dialect,
        endpoint: impl Into<String>,
        api_key: impl Into<SecretString>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            dialect,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            thinking_enabled: false,
            max_tokens: None,
            inline_markers: default_markers(dialect),
            transport: HttpTransport::default(),
        }
    }

    pub fn with_thinking(mut self, enabled: bool) -> Self {
        self.thinking_enabled = enabled;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_inline_markers(mut self, markers: MarkerPair) -> Self {
        self.inline_markers = Some(markers);
        self
    }

    pub fn without_inline_markers(mut self) -> Self {
        self.inline_markers = None;
        self
    }

    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Endpoint joined with an API path, tolerating a trailing slash on the endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }
}

fn default_markers(dialect: Dialect) -> Option<MarkerPair> {
    match dialect {
        Dialect::OpenAiLike => Some(MarkerPair::think()),
        Dialect::AnthropicLike => None,
    }
}

/// Settings shape as persisted by the application layer.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderSettings {
    #[serde(alias = "protocol")]
    dialect: Dialect,
    endpoint: String,
    api_key: SecretString,
    model: String,
    #[serde(default, alias = "thinking")]
    thinking_enabled: bool,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default, deserialize_with = "explicit_markers")]
    inline_markers: Option<Option<MarkerPair>>,
    #[serde(default)]
    transport: HttpTransport,
}

/// Keeps an explicit `null` (scanning off) apart from an absent key (dialect default).
fn explicit_markers<'de, D>(deserializer: D) -> Result<Option<Option<MarkerPair>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<MarkerPair>::deserialize(deserializer).map(Some)
}

impl From<ProviderSettings> for ProviderConfig {
    fn from(s: ProviderSettings) -> Self {
        Self {
            inline_markers: s
                .inline_markers
                .unwrap_or_else(|| default_markers(s.dialect)),
            dialect: s.dialect,
            endpoint: s.endpoint,
            api_key: s.api_key,
            model: s.model,
            thinking_enabled: s.thinking_enabled,
            max_tokens: s.max_tokens,
            transport: s.transport,
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Request an event-stream response instead of one JSON document
    pub streaming: bool,

    /// Cooperative stop signal, observed at every network read
    pub cancellation: Option<CancellationToken>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            streaming: true,
            cancellation: None,
        }
    }
}

impl ChatOptions {
    pub fn streaming() -> Self {
        Self::default()
    }

    pub fn non_streaming() -> Self {
        Self {
            streaming: false,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted() {
        let config = ProviderConfig::new(Dialect::OpenAiLike, "http://x", "sk-live", "m");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-live"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_default_markers_per_dialect() {
        let openai = ProviderConfig::new(Dialect::OpenAiLike, "http://x", "k", "m");
        assert_eq!(openai.inline_markers, Some(MarkerPair::think()));

        let anthropic = ProviderConfig::new(Dialect::AnthropicLike, "http://x", "k", "m");
        assert_eq!(anthropic.inline_markers, None);
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let config = ProviderConfig::new(Dialect::OpenAiLike, "http://x/", "k", "m");
        assert_eq!(config.url("/v1/chat/completions"), "http://x/v1/chat/completions");
    }

    #[test]
    fn test_deserialize_settings() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{
                "protocol": "anthropic",
                "endpoint": "https://api.anthropic.com",
                "apiKey": "k",
                "model": "claude-sonnet-4",
                "thinking": true,
                "transport": {"extraHeaders": {"x-team": "a"}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.dialect, Dialect::AnthropicLike);
        assert!(config.thinking_enabled);
        assert_eq!(config.api_key.expose_secret(), "k");
        assert!(config.inline_markers.is_none());
        assert_eq!(
            config.transport.extra_headers.unwrap().get("x-team"),
            Some(&"a".to_string())
        );
    }

    #[test]
    fn test_deserialize_openai_gets_think_markers() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"dialect":"openai","endpoint":"e","apiKey":"k","model":"m"}"#,
        )
        .unwrap();
        assert_eq!(config.inline_markers, Some(MarkerPair::think()));
        assert!(!config.thinking_enabled);
    }

    #[test]
    fn test_deserialize_null_markers_disables_scanning() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"dialect":"openai","endpoint":"e","apiKey":"k","model":"m","inlineMarkers":null}"#,
        )
        .unwrap();
        assert_eq!(config.inline_markers, None);

        let config: ProviderConfig = serde_json::from_str(
            r#"{"dialect":"anthropic","endpoint":"e","apiKey":"k","model":"m",
                "inlineMarkers":{"open":"<r>","close":"</r>"}}"#,
        )
        .unwrap();
        assert_eq!(config.inline_markers, Some(MarkerPair::new("<r>", "</r>")));
    }

    #[test]
    fn test_marker_builders() {
        let config = ProviderConfig::new(Dialect::OpenAiLike, "http://x", "k", "m")
            .without_inline_markers();
        assert_eq!(config.inline_markers, None);

        let config = config.with_inline_markers(MarkerPair::new("[[", "]]"));
        assert_eq!(config.inline_markers, Some(MarkerPair::new("[[", "]]")));
    }

    #[test]
    fn test_dialect_display() {
        assert_eq!(Dialect::OpenAiLike.to_string(), "OpenAI");
        assert_eq!(Dialect::AnthropicLike.to_string(), "Anthropic");
    }

    #[test]
    fn test_chat_options_default_streams() {
        let options = ChatOptions::default();
        assert!(options.streaming);
        assert!(options.cancellation.is_none());
        assert!(!ChatOptions::non_streaming().streaming);
    }
}
