//! Anthropic Messages API dialect.
//!
//! See: <https://docs.anthropic.com/en/api/messages>

use itertools::Itertools;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, DialectAdapter, FrameAction};
use crate::http::ProviderErrorBody;
use crate::model::{ChatMessage, Fragment, Role};
use crate::options::{Dialect, ProviderConfig, SecretString, DEFAULT_MAX_TOKENS};
use crate::sse::Frame;

const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Adapter for Anthropic-style backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter {
    thinking_enabled: bool,
}

impl AnthropicAdapter {
    pub fn new(thinking_enabled: bool) -> Self {
        Self { thinking_enabled }
    }

    fn reasoning(&self, text: String) -> Option<Fragment> {
        (self.thinking_enabled && !text.is_empty()).then(|| Fragment::reasoning(text))
    }

    fn plain(text: String) -> Option<Fragment> {
        (!text.is_empty()).then(|| Fragment::plain(text))
    }
}

impl DialectAdapter for AnthropicAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::AnthropicLike
    }

    fn path(&self) -> &'static str {
        MESSAGES_PATH
    }

    fn authorize(
        &self,
        request: RequestBuilder,
        api_key: &SecretString,
    ) -> Result<RequestBuilder, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.expose_secret())
                .map_err(|_| ClientError::Config("Invalid API key".to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(request.headers(headers))
    }

    fn request_body(
        &self,
        config: &ProviderConfig,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<serde_json::Value, ClientError> {
        let (system, conversation): (Vec<_>, Vec<_>) =
            messages.iter().partition(|m| m.role == Role::System);

        let system = system.iter().map(|m| m.content.as_str()).join("\n\n");

        let body = AnthropicRequest {
            model: &config.model,
            system: Some(system).filter(|s| !s.is_empty()),
            messages: conversation,
            max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream,
        };
        Ok(serde_json::to_value(body)?)
    }

    fn extract_frame(&self, frame: &Frame) -> FrameAction {
        match frame.event.as_deref() {
            Some("content_block_delta") => {}
            Some("message_stop") => return FrameAction::Stop,
            Some("error") => {
                let message = serde_json::from_str::<AnthropicErrorEvent>(&frame.data)
                    .map(|e| e.error.describe(Dialect::AnthropicLike))
                    .unwrap_or_else(|_| format!("Anthropic stream error: {}", frame.data));
                return FrameAction::Fail(message);
            }
            _ => return FrameAction::Emit(Vec::new()),
        }

        let event = match serde_json::from_str::<ContentBlockDeltaEvent>(&frame.data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed Anthropic frame");
                return FrameAction::Emit(Vec::new());
            }
        };

        let fragments = match event.delta {
            AnthropicDelta::Typed(TypedDelta::TextDelta { text }) => {
                Self::plain(text).into_iter().collect()
            }
            AnthropicDelta::Typed(TypedDelta::ThinkingDelta { thinking }) => {
                self.reasoning(thinking).into_iter().collect()
            }
            AnthropicDelta::Typed(TypedDelta::Other) => Vec::new(),
            AnthropicDelta::Untyped(UntypedDelta { thinking, text }) => match (thinking, text) {
                (Some(thinking), _) if !thinking.is_empty() => {
                    self.reasoning(thinking).into_iter().collect()
                }
                (_, Some(text)) => Self::plain(text).into_iter().collect(),
                _ => Vec::new(),
            },
        };

        FrameAction::Emit(fragments)
    }

    fn extract_response(&self, body: &str) -> Result<Vec<Fragment>, ClientError> {
        let response: AnthropicResponse = serde_json::from_str(body)?;

        if let Some(error) = response.error {
            return Err(ClientError::ProviderError(error.describe(Dialect::AnthropicLike)));
        }

        Ok(response
            .content
            .into_iter()
            .flatten()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Self::plain(text),
                AnthropicContentBlock::Thinking { thinking } => self.reasoning(thinking),
                AnthropicContentBlock::Other => None,
            })
            .collect())
    }
}

// --- Request Types ---

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a ChatMessage>,
    max_tokens: u32,
    stream: bool,
}

// --- Response Types ---

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Option<Vec<AnthropicContentBlock>>,
    #[serde(default)]
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    Thinking {
        #[serde(alias = "text")]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorEvent {
    error: ProviderErrorBody,
}

// --- SSE Event Types ---

#[derive(Debug, Deserialize)]
struct ContentBlockDeltaEvent {
    delta: AnthropicDelta,
}

/// Deltas normally carry a `type` tag; some proxies omit it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnthropicDelta {
    Typed(TypedDelta),
    Untyped(UntypedDelta),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TypedDelta {
    TextDelta {
        text: String,
    },
    ThinkingDelta {
        #[serde(alias = "text")]
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct UntypedDelta {
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> Frame {
        Frame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    fn emitted(action: FrameAction) -> Vec<Fragment> {
        match action {
            FrameAction::Emit(fragments) => fragments,
            other => panic!("expected Emit, got {:?}", other),
        }
    }

    #[test]
    fn test_thinking_then_text_deltas() {
        let adapter = AnthropicAdapter::new(true);
        let thinking = emitted(adapter.extract_frame(&frame(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"why"}}"#,
        )));
        let text = emitted(adapter.extract_frame(&frame(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"42"}}"#,
        )));
        assert_eq!(thinking, vec![Fragment::reasoning("why")]);
        assert_eq!(text, vec![Fragment::plain("42")]);
    }

    #[test]
    fn test_thinking_delta_with_text_field() {
        let adapter = AnthropicAdapter::new(true);
        let fragments = emitted(adapter.extract_frame(&frame(
            "content_block_delta",
            r#"{"delta":{"type":"thinking_delta","text":"why"}}"#,
        )));
        assert_eq!(fragments, vec![Fragment::reasoning("why")]);
    }

    #[test]
    fn test_thinking_suppressed_when_disabled() {
        let adapter = AnthropicAdapter::new(false);
        let fragments = emitted(adapter.extract_frame(&frame(
            "content_block_delta",
            r#"{"delta":{"type":"thinking_delta","thinking":"why"}}"#,
        )));
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_untyped_delta() {
        let adapter = AnthropicAdapter::new(true);
        let fragments = emitted(adapter.extract_frame(&frame(
            "content_block_delta",
            r#"{"delta":{"thinking":"hmm"}}"#,
        )));
        assert_eq!(fragments, vec![Fragment::reasoning("hmm")]);

        let fragments = emitted(
            adapter.extract_frame(&frame("content_block_delta", r#"{"delta":{"text":"ok"}}"#)),
        );
        assert_eq!(fragments, vec![Fragment::plain("ok")]);

        let fragments = emitted(adapter.extract_frame(&frame(
            "content_block_delta",
            r#"{"delta":{"thinking":"","text":"x"}}"#,
        )));
        assert_eq!(fragments, vec![Fragment::plain("x")]);
    }

    #[test]
    fn test_other_events_ignored() {
        let adapter = AnthropicAdapter::new(true);
        for event in ["message_start", "content_block_start", "ping", "message_delta"] {
            let fragments = emitted(adapter.extract_frame(&frame(event, r#"{"delta":{"text":"x"}}"#)));
            assert!(fragments.is_empty(), "{event} should be ignored");
        }

        let fragments = emitted(adapter.extract_frame(&frame(
            "content_block_delta",
            r#"{"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
        )));
        assert!(fragments.is_empty());

        let unnamed = Frame {
            event: None,
            data: r#"{"delta":{"text":"x"}}"#.to_string(),
        };
        assert!(emitted(adapter.extract_frame(&unnamed)).is_empty());
    }

    #[test]
    fn test_message_stop_and_error() {
        let adapter = AnthropicAdapter::new(false);
        assert!(matches!(
            adapter.extract_frame(&frame("message_stop", r#"{"type":"message_stop"}"#)),
            FrameAction::Stop
        ));

        match adapter.extract_frame(&frame(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )) {
            FrameAction::Fail(message) => {
                assert_eq!(message, "Anthropic error (overloaded_error): Overloaded")
            }
            other => panic!("expected Fail, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_delta_skipped() {
        let adapter = AnthropicAdapter::new(true);
        let fragments = emitted(adapter.extract_frame(&frame("content_block_delta", "{oops")));
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_non_streaming_suppresses_thinking_when_disabled() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "let me see", "signature": "sig"},
                {"type": "text", "text": "Paris"}
            ]
        }"#;

        let fragments = AnthropicAdapter::new(false).extract_response(body).unwrap();
        assert_eq!(fragments, vec![Fragment::plain("Paris")]);

        let fragments = AnthropicAdapter::new(true).extract_response(body).unwrap();
        assert_eq!(
            fragments,
            vec![Fragment::reasoning("let me see"), Fragment::plain("Paris")]
        );
    }

    #[test]
    fn test_non_streaming_null_content_yields_nothing() {
        let fragments = AnthropicAdapter::new(true)
            .extract_response(r#"{"id":"msg_1","content":null}"#)
            .unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_non_streaming_ignores_unknown_blocks() {
        let body = r#"{"content":[{"type":"tool_use","id":"t","name":"n","input":{}},{"type":"text","text":"done"}]}"#;
        let fragments = AnthropicAdapter::new(true).extract_response(body).unwrap();
        assert_eq!(fragments, vec![Fragment::plain("done")]);
    }

    #[test]
    fn test_request_body_lifts_system() {
        let config = ProviderConfig::new(Dialect::AnthropicLike, "http://x", "k", "claude");
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::system("no emoji"),
        ];
        let body = AnthropicAdapter::new(false)
            .request_body(&config, &messages, false)
            .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "claude",
                "system": "be brief\n\nno emoji",
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ],
                "max_tokens": 4096,
                "stream": false
            })
        );
    }

    #[test]
    fn test_request_body_without_system() {
        let config = ProviderConfig::new(Dialect::AnthropicLike, "http://x", "k", "claude")
            .with_max_tokens(128);
        let body = AnthropicAdapter::new(false)
            .request_body(&config, &[ChatMessage::user("hi")], true)
            .unwrap();
        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], 128);
    }
}
