//! OpenAI-style chat completions dialect.
//!
//! Speaks `/v1/chat/completions`. Reasoning arrives either in its own field
//! (`reasoning_content` or `reasoning`) or inlined in `content` between
//! markers, which the scanner handles downstream.
//! See: <https://platform.openai.com/docs/api-reference/chat>

use itertools::Itertools;
use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, DialectAdapter, FrameAction};
use crate::http::ProviderErrorBody;
use crate::model::{ChatMessage, Fragment};
use crate::options::{Dialect, ProviderConfig, SecretString};
use crate::sse::Frame;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Adapter for OpenAI-compatible backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DialectAdapter for OpenAiAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::OpenAiLike
    }

    fn path(&self) -> &'static str {
        CHAT_COMPLETIONS_PATH
    }

    fn authorize(
        &self,
        request: RequestBuilder,
        api_key: &SecretString,
    ) -> Result<RequestBuilder, ClientError> {
        Ok(request.header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret())))
    }

    fn request_body(
        &self,
        config: &ProviderConfig,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<serde_json::Value, ClientError> {
        let body = OpenAiRequest {
            model: &config.model,
            messages,
            max_tokens: config.max_tokens,
            stream,
        };
        Ok(serde_json::to_value(body)?)
    }

    fn extract_frame(&self, frame: &Frame) -> FrameAction {
        let chunk = match serde_json::from_str::<OpenAiChunk>(&frame.data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed OpenAI frame");
                return FrameAction::Emit(Vec::new());
            }
        };

        if let Some(error) = chunk.error {
            return FrameAction::Fail(error.describe(Dialect::OpenAiLike));
        }

        let fragments = chunk
            .choices
            .into_iter()
            .flatten()
            .next()
            .and_then(|choice| choice.delta)
            .map(ChoiceContent::into_fragments)
            .unwrap_or_default();

        FrameAction::Emit(fragments)
    }

    fn extract_response(&self, body: &str) -> Result<Vec<Fragment>, ClientError> {
        let response: OpenAiResponse = serde_json::from_str(body)?;

        if let Some(error) = response.error {
            return Err(ClientError::ProviderError(error.describe(Dialect::OpenAiLike)));
        }

        Ok(response
            .choices
            .into_iter()
            .flatten()
            .next()
            .and_then(|choice| choice.message)
            .map(ChoiceContent::into_fragments)
            .unwrap_or_default())
    }
}

// --- Request Types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

// --- Response Types ---

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Option<Vec<StreamChoice>>,
    #[serde(default)]
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<ChoiceContent>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Option<Vec<ResponseChoice>>,
    #[serde(default)]
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: Option<ChoiceContent>,
}

/// Shared shape of `choices[0].delta` and `choices[0].message`.
#[derive(Debug, Default, Deserialize)]
struct ChoiceContent {
    #[serde(default)]
    reasoning_content: Option<ContentValue>,
    #[serde(default)]
    reasoning: Option<ContentValue>,
    #[serde(default)]
    content: Option<ContentValue>,
}

impl ChoiceContent {
    fn into_fragments(self) -> Vec<Fragment> {
        let mut fragments = Vec::with_capacity(2);

        let reasoning = self
            .reasoning_content
            .and_then(ContentValue::into_text)
            .or_else(|| self.reasoning.and_then(ContentValue::into_text));
        if let Some(text) = reasoning {
            fragments.push(Fragment::reasoning(text));
        }

        if let Some(text) = self.content.and_then(ContentValue::into_text) {
            fragments.push(Fragment::plain(text));
        }

        fragments
    }
}

/// A text field that is either a bare string or an array of text blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentValue {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Unsupported(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl ContentValue {
    /// Flatten to text; `None` for empty or unusable values.
    fn into_text(self) -> Option<String> {
        let text = match self {
            ContentValue::Text(text) => text,
            ContentValue::Blocks(blocks) => blocks.into_iter().filter_map(|b| b.text).join(""),
            ContentValue::Unsupported(_) => return None,
        };
        Some(text).filter(|t| !t.is_empty())
    }
}
