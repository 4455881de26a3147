//! Server-Sent Events (SSE) frame decoding.
//!
//! Turns a raw incremental byte stream into discrete [`Frame`]s, independent of
//! which dialect is being spoken.
//!
//! SSE format:
//! ```text
//! event: content_block_delta
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! Each `data:` line is treated as its own frame; an `event:` line names the
//! next `data:` line only.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::client::ClientError;

/// One decoded SSE record, prior to JSON parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Name from the preceding `event:` line, if any
    pub event: Option<String>,

    /// Text after `data:`, trimmed
    pub data: String,
}

/// Incremental line splitter and field parser.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across chunks decode correctly.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    pending_event: Option<String>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and collect every frame completed by it.
    ///
    /// The trailing partial line stays buffered for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = memchr_newline(&self.buffer[start..]) {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            start = end + 1;

            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            if self.done {
                self.buffer.clear();
                return frames;
            }
        }
        self.buffer.drain(..start);

        frames
    }

    /// Process whatever partial line remains once the byte stream has ended.
    pub fn finish(&mut self) -> Option<Frame> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.process_line(&line)
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        let line = line.trim();

        // Blank lines separate events. Anything else without a recognized
        // field prefix (including `:` comments) falls through `parse_sse_line`.
        if line.is_empty() {
            return None;
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.pending_event = Some(name.trim().to_string());
            return None;
        }

        let data = parse_sse_line(line)?;
        if is_done_marker(data) {
            self.done = true;
            return None;
        }

        Some(Frame {
            event: self.pending_event.take(),
            data: data.to_string(),
        })
    }
}

fn memchr_newline(haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == b'\n')
}

/// Decode a byte stream into a stream of frames.
///
/// The stream ends at `[DONE]` or when the bytes run out. An upstream error is
/// yielded once and then the stream terminates.
pub fn decode_frames<S, E>(bytes: S) -> impl Stream<Item = Result<Frame, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send,
{
    stream::unfold(
        (Box::pin(bytes), FrameDecoder::new(), VecDeque::<Frame>::new(), false),
        |(mut byte_stream, mut decoder, mut ready, mut stream_ended)| async move {
            loop {
                if let Some(frame) = ready.pop_front() {
                    tracing::trace!(event = ?frame.event, len = frame.data.len(), "sse frame");
                    return Some((Ok(frame), (byte_stream, decoder, ready, stream_ended)));
                }

                if stream_ended || decoder.is_done() {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        ready.extend(decoder.push(&chunk));
                    }
                    Some(Err(e)) => {
                        stream_ended = true;
                        return Some((Err(e.into()), (byte_stream, decoder, ready, stream_ended)));
                    }
                    None => {
                        stream_ended = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        },
    )
}

/// Extension trait for `reqwest::Response` to enable SSE frame streaming.
///
/// # Example
/// ```ignore
/// use unichat::sse::SSEResponseExt;
///
/// let response = client.post(url).send().await?;
/// let mut frames = Box::pin(response.sse());
/// while let Some(frame) = frames.next().await {
///     let frame = frame?;
///     println!("{:?}: {}", frame.event, frame.data);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response body into a stream of frames.
    fn sse(self) -> impl Stream<Item = Result<Frame, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<Frame, ClientError>> + Send {
        decode_frames(self.bytes_stream())
    }
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use unichat::sse::parse_sse_line;
///
/// assert_eq!(parse_sse_line("data: {\"key\": \"value\"}"), Some("{\"key\": \"value\"}"));
/// assert_eq!(parse_sse_line("data:{}"), Some("{}"));
/// assert_eq!(parse_sse_line("invalid"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data payload indicates the stream is done.
///
/// # Example
/// ```
/// use unichat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: Option<&str>, data: &str) -> Frame {
        Frame {
            event: event.map(str::to_string),
            data: data.to_string(),
        }
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
        let owned: Vec<Result<Bytes, std::io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        stream::iter(owned)
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line("data: hello"), Some("hello"));
        assert_eq!(parse_sse_line("data:   spaces  "), Some("spaces"));
        assert_eq!(parse_sse_line("event: x"), None);
        assert_eq!(parse_sse_line(""), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(decoder.push(b":1}\n"), vec![frame(None, "{\"a\":1}")]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk_with_crlf() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(frames, vec![frame(None, "one"), frame(None, "two")]);
    }

    #[test]
    fn test_event_name_applies_to_next_data_only() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"event: ping\ndata: {}\n\ndata: {\"x\":1}\n");
        assert_eq!(frames, vec![frame(Some("ping"), "{}"), frame(None, "{\"x\":1}")]);
    }

    #[test]
    fn test_done_stops_decoding() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: a\ndata: [DONE]\ndata: b\n");
        assert_eq!(frames, vec![frame(None, "a")]);
        assert!(decoder.is_done());
        assert!(decoder.push(b"data: c\n").is_empty());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_comment_lines_are_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b": keep-alive\nevent: ping\n: note\ndata: {}\n");
        assert_eq!(frames, vec![frame(Some("ping"), "{}")]);
    }

    #[test]
    fn test_finish_flushes_partial_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some(frame(None, "tail")));
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let bytes = "data: héllo\n".as_bytes();
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec![frame(None, "héllo")]);
    }

    #[tokio::test]
    async fn test_decode_frames_stream() {
        let frames: Vec<_> = decode_frames(chunks(&["data: a\n", "\ndata:", " b\n", "data: [DONE]\n"]))
            .collect()
            .await;
        let frames: Vec<_> = frames.into_iter().map(Result::unwrap).collect();
        assert_eq!(frames, vec![frame(None, "a"), frame(None, "b")]);
    }

    #[tokio::test]
    async fn test_decode_frames_propagates_error() {
        let bytes = stream::iter(vec![
            Ok(Bytes::from_static(b"data: a\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: never\n")),
        ]);
        let items: Vec<_> = decode_frames(bytes).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &frame(None, "a"));
        assert!(matches!(items[1], Err(ClientError::Io(_))));
    }
}
