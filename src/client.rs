//! Chat model facade, the dialect seam, and error types.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::model::{ChatMessage, Fragment};
use crate::options::{ChatOptions, Dialect, ProviderConfig, SecretString};
use crate::providers::{AnthropicAdapter, OpenAiAdapter};
use crate::sequencer;
use crate::sse::Frame;
use crate::stream::DeltaStream;

/// Errors that can occur during a call.
///
/// These never reach the consumer directly; the sequencer renders the first
/// one as a terminal `error` event.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// What the sequencer should do with one decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameAction {
    /// Forward these fragments (possibly none)
    Emit(Vec<Fragment>),

    /// The dialect signalled a normal end of stream
    Stop,

    /// The backend reported an error mid-stream
    Fail(String),
}

/// Per-dialect wire knowledge: how to build the request and how to read the
/// response.
///
/// Implement this trait to add support for a new dialect. Extraction must not
/// fail on a malformed frame; it returns an empty [`FrameAction::Emit`] instead.
pub trait DialectAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// API path appended to the configured endpoint.
    fn path(&self) -> &'static str;

    /// Attach authentication headers.
    fn authorize(
        &self,
        request: RequestBuilder,
        api_key: &SecretString,
    ) -> Result<RequestBuilder, ClientError>;

    /// JSON request body for this call.
    fn request_body(
        &self,
        config: &ProviderConfig,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<serde_json::Value, ClientError>;

    /// Extract fragments from one streaming frame.
    fn extract_frame(&self, frame: &Frame) -> FrameAction;

    /// Extract fragments from a complete non-streaming response body.
    fn extract_response(&self, body: &str) -> Result<Vec<Fragment>, ClientError>;
}

/// Pick the adapter for a configuration.
pub fn adapter_for(config: &ProviderConfig) -> Arc<dyn DialectAdapter> {
    match config.dialect {
        Dialect::OpenAiLike => Arc::new(OpenAiAdapter::new()),
        Dialect::AnthropicLike => Arc::new(AnthropicAdapter::new(config.thinking_enabled)),
    }
}

/// A chat model bound to one provider configuration.
///
/// Each call owns its own decoder and scanner state, so calls may run
/// concurrently. Clones share one HTTP client and its connection pool.
///
/// # Example
/// ```no_run
/// use futures::StreamExt;
/// use unichat::client::ChatModel;
/// use unichat::model::{ChatMessage, Delta};
/// use unichat::options::{ChatOptions, Dialect, ProviderConfig};
///
/// # async fn run() {
/// let config = ProviderConfig::new(Dialect::OpenAiLike, "https://api.openai.com", "sk-...", "gpt-4o");
/// let model = ChatModel::new(config);
///
/// let mut deltas = model.chat(vec![ChatMessage::user("Hello!")], ChatOptions::default());
/// while let Some(delta) = deltas.next().await {
///     if let Delta::Token { value } = delta {
///         print!("{}", value);
///     }
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct ChatModel {
    config: Arc<ProviderConfig>,
    adapter: Arc<dyn DialectAdapter>,
    http: Arc<OnceCell<Client>>,
}

impl ChatModel {
    pub fn new(config: ProviderConfig) -> Self {
        let adapter = adapter_for(&config);
        Self::with_adapter(config, adapter)
    }

    /// Use a custom adapter instead of the one implied by `config.dialect`.
    pub fn with_adapter(config: ProviderConfig, adapter: Arc<dyn DialectAdapter>) -> Self {
        Self {
            config: Arc::new(config),
            adapter,
            http: Arc::new(OnceCell::new()),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Start a call.
    ///
    /// The returned stream is lazy: nothing is sent until it is first polled.
    /// It always begins with a `start` event and ends with exactly one `end`
    /// or `error` event.
    pub fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> DeltaStream {
        let cancel = options.cancellation.unwrap_or_else(CancellationToken::new);
        let inner = sequencer::call_deltas(
            Arc::clone(&self.http),
            Arc::clone(&self.config),
            Arc::clone(&self.adapter),
            messages,
            options.streaming,
        );
        Box::pin(sequencer::with_lifecycle(inner, cancel))
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("config", &self.config)
            .field("dialect", &self.adapter.dialect())
            .finish()
    }
}

/// Bind a configuration and return the call function.
///
/// # Example
/// ```no_run
/// use unichat::client::create_chat_model;
/// use unichat::model::ChatMessage;
/// use unichat::options::{ChatOptions, Dialect, ProviderConfig};
///
/// let chat = create_chat_model(ProviderConfig::new(
///     Dialect::AnthropicLike,
///     "https://api.anthropic.com",
///     "sk-ant-...",
///     "claude-sonnet-4-5",
/// ));
/// let deltas = chat(vec![ChatMessage::user("Hi")], ChatOptions::non_streaming());
/// ```
pub fn create_chat_model(
    config: ProviderConfig,
) -> impl Fn(Vec<ChatMessage>, ChatOptions) -> DeltaStream + Send + Sync + Clone {
    let model = ChatModel::new(config);
    move |messages, options| model.chat(messages, options)
}
