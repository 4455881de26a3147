//! HTTP client utilities for making requests to LLM APIs.
//!
//! One POST per call; no retries.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;

use crate::client::{ClientError, DialectAdapter};
use crate::model::ChatMessage;
use crate::options::{Dialect, HttpTransport, ProviderConfig};

/// Build a configured HTTP client from transport options.
pub fn build_http_client(transport: &HttpTransport) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(proxy_url) = &transport.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
    }

    Ok(builder.build()?)
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Send the single chat request for a call and check its status.
///
/// A non-2xx response is turned into an error carrying the provider's message.
pub async fn send_chat_request(
    http_client: &Client,
    config: &ProviderConfig,
    adapter: &dyn DialectAdapter,
    messages: &[ChatMessage],
    stream: bool,
) -> Result<reqwest::Response, ClientError> {
    let url = config.url(adapter.path());
    let body = adapter.request_body(config, messages, stream)?;

    let mut req = http_client
        .post(&url)
        .header(CONTENT_TYPE, "application/json");
    req = adapter.authorize(req, &config.api_key)?;
    req = add_extra_headers(req, &config.transport.extra_headers);

    tracing::debug!(
        dialect = %adapter.dialect(),
        %url,
        model = %config.model,
        stream,
        "sending chat request"
    );

    let response = req.json(&body).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(handle_error_response(adapter.dialect(), status, &body));
    }

    Ok(response)
}

/// Map a non-success response to a [`ClientError`].
pub fn handle_error_response(dialect: Dialect, status: StatusCode, body: &str) -> ClientError {
    if let Ok(error_resp) = serde_json::from_str::<ProviderErrorResponse>(body) {
        ClientError::ProviderError(error_resp.error.describe(dialect))
    } else {
        ClientError::ProviderError(format!("HTTP {}: {}", status, body))
    }
}

/// Error envelope shared by both dialects: `{"error": {"type": ..., "message": ...}}`.
#[derive(Debug, Clone, Deserialize)]
struct ProviderErrorResponse {
    error: ProviderErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProviderErrorBody {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: String,
}

impl ProviderErrorBody {
    pub(crate) fn describe(&self, dialect: Dialect) -> String {
        match &self.error_type {
            Some(error_type) => format!("{} error ({}): {}", dialect, error_type, self.message),
            None => format!("{} error: {}", dialect, self.message),
        }
    }
}
