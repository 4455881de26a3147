//! Delta sequencing: frames to fragments to deltas, wrapped in a call lifecycle.
//!
//! ```text
//! bytes -> sse::decode_frames -> DialectAdapter -> FragmentRouter -> with_lifecycle -> consumer
//! ```
//!
//! The non-streaming path feeds one response body straight into the adapter.

use std::sync::Arc;

use async_stream::{stream, try_stream};
use futures::{future, Stream, StreamExt};
use reqwest::Client;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, DialectAdapter, FrameAction};
use crate::http::{build_http_client, send_chat_request};
use crate::model::{ChatMessage, Delta, Fragment, FragmentKind};
use crate::options::{MarkerPair, ProviderConfig};
use crate::scanner::InlineTagScanner;
use crate::sse::{Frame, SSEResponseExt};

/// Turns fragments into deltas.
///
/// Plain fragments go through the inline marker scanner when one is
/// configured; reasoning fragments become thinking deltas directly and never
/// touch scanner state.
#[derive(Debug, Clone)]
pub struct FragmentRouter {
    scanner: Option<InlineTagScanner>,
}

impl FragmentRouter {
    pub fn new(markers: Option<MarkerPair>) -> Self {
        Self {
            scanner: markers
                .filter(|m| !m.open.is_empty() && !m.close.is_empty())
                .map(InlineTagScanner::new),
        }
    }

    pub fn route(&mut self, fragment: Fragment) -> Vec<Delta> {
        if fragment.text.is_empty() {
            return Vec::new();
        }
        match (fragment.kind, self.scanner.as_mut()) {
            (FragmentKind::Reasoning, _) => vec![Delta::thinking(fragment.text)],
            (FragmentKind::Plain, Some(scanner)) => scanner.push(&fragment.text),
            (FragmentKind::Plain, None) => vec![Delta::token(fragment.text)],
        }
    }

    /// Release anything the scanner is still holding back.
    pub fn finish(&mut self) -> Vec<Delta> {
        self.scanner
            .as_mut()
            .map(InlineTagScanner::finish)
            .unwrap_or_default()
    }
}

/// Route a stream of frames through an adapter and router.
///
/// Ends on the dialect's stop signal or when frames run out; a mid-stream
/// provider error or a transport error ends it with `Err`.
pub fn route_frames<S>(
    frames: S,
    adapter: Arc<dyn DialectAdapter>,
    mut router: FragmentRouter,
) -> impl Stream<Item = Result<Delta, ClientError>> + Send
where
    S: Stream<Item = Result<Frame, ClientError>> + Send + 'static,
{
    try_stream! {
        for await frame in frames {
            let frame = frame?;
            match adapter.extract_frame(&frame) {
                FrameAction::Emit(fragments) => {
                    for fragment in fragments {
                        for delta in router.route(fragment) {
                            yield delta;
                        }
                    }
                }
                FrameAction::Stop => break,
                FrameAction::Fail(message) => {
                    Err::<(), _>(ClientError::ProviderError(message))?;
                }
            }
        }

        for delta in router.finish() {
            yield delta;
        }
    }
}

/// Route one complete response body through an adapter and router.
pub fn route_body(
    body: &str,
    adapter: &dyn DialectAdapter,
    mut router: FragmentRouter,
) -> Result<Vec<Delta>, ClientError> {
    let mut deltas: Vec<Delta> = adapter
        .extract_response(body)?
        .into_iter()
        .flat_map(|fragment| router.route(fragment))
        .collect();
    deltas.extend(router.finish());
    Ok(deltas)
}

/// The content deltas of one call, without lifecycle events.
///
/// Nothing happens until the stream is first polled. The HTTP client is built
/// on the first call through `http` and reused afterwards.
pub fn call_deltas(
    http: Arc<OnceCell<Client>>,
    config: Arc<ProviderConfig>,
    adapter: Arc<dyn DialectAdapter>,
    messages: Vec<ChatMessage>,
    streaming: bool,
) -> impl Stream<Item = Result<Delta, ClientError>> + Send {
    try_stream! {
        let http_client = http
            .get_or_try_init(|| future::ready(build_http_client(&config.transport)))
            .await?;
        let response =
            send_chat_request(http_client, &config, adapter.as_ref(), &messages, streaming).await?;
        let router = FragmentRouter::new(config.inline_markers.clone());

        if streaming {
            let deltas = route_frames(response.sse(), Arc::clone(&adapter), router);
            for await delta in deltas {
                let delta = delta?;
                yield delta;
            }
        } else {
            let body = response.text().await?;
            for delta in route_body(&body, adapter.as_ref(), router)? {
                yield delta;
            }
        }
    }
}

enum Step {
    Cancelled,
    Next(Option<Result<Delta, ClientError>>),
}

/// Wrap content deltas in the call lifecycle.
///
/// Emits `start` first, then the inner deltas, then exactly one terminal
/// event: `end` on completion or cancellation, `error` on the first failure.
/// Cancellation is checked every time the inner stream would be polled.
pub fn with_lifecycle<S>(inner: S, cancel: CancellationToken) -> impl Stream<Item = Delta> + Send
where
    S: Stream<Item = Result<Delta, ClientError>> + Send + 'static,
{
    stream! {
        yield Delta::start();

        let mut inner = Box::pin(inner);
        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                item = inner.next() => Step::Next(item),
            };

            match step {
                Step::Cancelled => {
                    tracing::debug!("chat call cancelled");
                    yield Delta::end();
                    break;
                }
                Step::Next(Some(Ok(delta))) => {
                    yield delta;
                }
                Step::Next(Some(Err(e))) => {
                    tracing::debug!(error = %e, "chat call failed");
                    yield Delta::error(e.to_string());
                    break;
                }
                Step::Next(None) => {
                    tracing::debug!("chat call finished");
                    yield Delta::end();
                    break;
                }
            }
        }
    }
}
