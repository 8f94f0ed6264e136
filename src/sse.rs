//! Server-Sent Events (SSE) framing for the chat stream.
//!
//! The backend writes one JSON payload per frame, frames separated by a blank line:
//! ```text
//! data: {"type":"answer","content":"Net income rose "}
//!
//! data: {"type":"answer","content":"12%."}
//!
//! data: {"type":"done"}
//! ```
//!
//! Transport chunks can end anywhere, including inside a multi-byte UTF-8
//! character or inside a frame. [`SseDecoder`] keeps whatever has not been
//! resolved yet and only hands out complete frames.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};

use crate::client::ClientError;

/// Separator between two frames.
pub const FRAME_SEPARATOR: &str = "\n\n";

const DATA_PREFIX: &str = "data:";

/// Incremental decoder turning raw body chunks into complete SSE frames.
///
/// One decoder belongs to exactly one response body.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a frame separator.
    buffer: String,
    /// Length of `buffer` already searched for a separator.
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one body chunk and return the frames it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode_utf8(chunk);

        // A separator can straddle the previous chunk end only through a trailing '\n'.
        let mut from = self.scanned;
        if self.buffer[..from].ends_with('\n') {
            from -= 1;
        }

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[from..].find(FRAME_SEPARATOR) {
            let end = from + offset;
            frames.push(self.buffer[start..end].to_string());
            start = end + FRAME_SEPARATOR.len();
            from = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        frames
    }

    /// Text received after the last complete frame.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// Streaming UTF-8 decode: an incomplete sequence at the end of the chunk
    /// waits for the next chunk, invalid bytes become U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));

                    match e.error_len() {
                        Some(invalid) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Extract the payload of a `data:` frame.
///
/// Returns `None` for frames without the `data:` prefix and for empty
/// (keep-alive) payloads.
///
/// # Example
/// ```
/// use cashflow_chat::sse::parse_data_frame;
///
/// assert_eq!(parse_data_frame("data: {\"type\":\"done\"}"), Some("{\"type\":\"done\"}"));
/// assert_eq!(parse_data_frame("data:   "), None);
/// assert_eq!(parse_data_frame(": ping"), None);
/// ```
pub fn parse_data_frame(frame: &str) -> Option<&str> {
    frame
        .strip_prefix(DATA_PREFIX)
        .map(str::trim)
        .filter(|payload| !payload.is_empty())
}

/// Turn a body byte stream into a stream of non-empty `data:` payloads.
///
/// A transport error is yielded once and ends the stream. Text left over
/// when the body ends without a trailing separator is discarded.
pub fn sse_data<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Into<ClientError> + Send,
{
    stream::unfold(
        (Box::pin(byte_stream), SseDecoder::new(), VecDeque::new(), false),
        |(mut byte_stream, mut decoder, mut ready, mut ended)| async move {
            loop {
                if let Some(payload) = ready.pop_front() {
                    return Some((Ok(payload), (byte_stream, decoder, ready, ended)));
                }

                if ended {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        ready.extend(
                            decoder
                                .feed(&chunk)
                                .iter()
                                .filter_map(|frame| parse_data_frame(frame))
                                .map(str::to_string),
                        );
                    }
                    Some(Err(e)) => {
                        ended = true;
                        return Some((Err(e.into()), (byte_stream, decoder, ready, ended)));
                    }
                    None => {
                        if !decoder.remainder().trim().is_empty() {
                            tracing::debug!(
                                remainder_len = decoder.remainder().len(),
                                "body ended inside an unterminated frame"
                            );
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extension trait for `reqwest::Response` to read the body as SSE payloads.
pub trait SseResponseExt {
    /// Convert the response body into a stream of `data:` payloads.
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send;
}

impl SseResponseExt for reqwest::Response {
    fn sse(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        sse_data(self.bytes_stream().map_err(ClientError::Stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FRAMES: &str =
        "data: {\"type\":\"answer\",\"content\":\"hi\"}\n\ndata: {\"type\":\"done\"}\n\n";

    #[test]
    fn test_feed_complete_frames() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(TWO_FRAMES.as_bytes());
        assert_eq!(
            frames,
            vec![
                "data: {\"type\":\"answer\",\"content\":\"hi\"}".to_string(),
                "data: {\"type\":\"done\"}".to_string(),
            ]
        );
        assert_eq!(decoder.remainder(), "");
    }

    #[test]
    fn test_split_at_every_offset() {
        let bytes = TWO_FRAMES.as_bytes();
        let mut whole = SseDecoder::new();
        let expected = whole.feed(bytes);

        for split in 0..=bytes.len() {
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.feed(&bytes[..split]);
            frames.extend(decoder.feed(&bytes[split..]));
            assert_eq!(frames, expected, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = SseDecoder::new();
        let frames: Vec<String> = TWO_FRAMES
            .as_bytes()
            .iter()
            .flat_map(|b| decoder.feed(std::slice::from_ref(b)))
            .collect();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let text = "data: {\"type\":\"answer\",\"content\":\"净利润€\"}\n\n";
        let bytes = text.as_bytes();
        let euro_start = text.find('€').unwrap();

        for split in euro_start..euro_start + '€'.len_utf8() {
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.feed(&bytes[..split]);
            frames.extend(decoder.feed(&bytes[split..]));
            assert_eq!(frames, vec![text.trim_end().to_string()]);
        }
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: a\xffb\n\n");
        assert_eq!(frames, vec!["data: a\u{FFFD}b".to_string()]);
    }

    #[test]
    fn test_incomplete_frame_is_retained() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"do").is_empty());
        assert_eq!(decoder.remainder(), "data: {\"type\":\"do");
        assert_eq!(decoder.feed(b"ne\"}\n\n"), vec!["data: {\"type\":\"done\"}".to_string()]);
        assert_eq!(decoder.remainder(), "");
    }

    #[test]
    fn test_separator_across_chunk_end() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: a\n").is_empty());
        assert_eq!(
            decoder.feed(b"\ndata: b\n\ndata: c"),
            vec!["data: a".to_string(), "data: b".to_string()]
        );
        assert_eq!(decoder.remainder(), "data: c");
    }

    #[test]
    fn test_large_frame_is_not_rescanned() {
        let mut decoder = SseDecoder::new();
        let payload = "x".repeat(4096);

        assert!(decoder.feed(b"data: ").is_empty());
        for chunk in payload.as_bytes().chunks(7) {
            assert!(decoder.feed(chunk).is_empty());
            assert_eq!(decoder.scanned, decoder.buffer.len());
        }

        let frames = decoder.feed(b"\n\n");
        assert_eq!(frames, vec![format!("data: {}", payload)]);
        assert_eq!(decoder.scanned, 0);
    }

    #[test]
    fn test_parse_data_frame() {
        assert_eq!(parse_data_frame("data: hello"), Some("hello"));
        assert_eq!(parse_data_frame("data:hello"), Some("hello"));
        assert_eq!(parse_data_frame("data:   spaces  "), Some("spaces"));
        assert_eq!(parse_data_frame("data:"), None);
        assert_eq!(parse_data_frame("data: \n "), None);
        assert_eq!(parse_data_frame("event: answer\ndata: x"), None);
        assert_eq!(parse_data_frame(""), None);
    }

    #[tokio::test]
    async fn test_sse_data_skips_keep_alives() {
        let chunks: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from_static(b"data: \n\n: comment\n\ndata: one\n")),
            Ok(Bytes::from_static(b"\ndata: two\n\ndata: tail")),
        ];
        let payloads: Vec<String> = sse_data(stream::iter(chunks))
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(payloads, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_sse_data_error_ends_stream() {
        let chunks: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Err(ClientError::Config("boom".to_string())),
            Ok(Bytes::from_static(b"data: never\n\n")),
        ];
        let items: Vec<Result<String, ClientError>> = sse_data(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "one");
        assert!(matches!(items[1], Err(ClientError::Config(_))));
    }
}
