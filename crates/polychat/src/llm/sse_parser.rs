//! Minimal Server-Sent Events parser over a byte stream.
//!
//! Splits the body on blank lines and yields one [`SseEvent`] per block.
//! Comment lines (starting with `:`) and unknown fields are ignored.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// A single parsed SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Stream adapter turning raw body chunks into SSE events.
pub struct SseEventStream<S> {
    inner: S,
    buffer: Vec<u8>,
    /// Buffer prefix already searched for a block boundary.
    scanned: usize,
    done: bool,
}

impl<S> SseEventStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            scanned: 0,
            done: false,
        }
    }

    /// Pop the next complete event block from the buffer, if any.
    fn take_block(&mut self) -> Option<Vec<u8>> {
        let start = self.scanned;
        let Some(offset) = self.buffer[start..].windows(2).position(|w| w == b"\n\n") else {
            // The last byte may be the first half of a boundary
            self.scanned = self.buffer.len().saturating_sub(1);
            return None;
        };
        let end = start + offset;
        let block = self.buffer[..end].to_vec();
        self.buffer.drain(..end + 2);
        self.scanned = 0;
        Some(block)
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        // CRLF and LF framing are equivalent
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }
}

fn parse_block(block: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(block);
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

impl<S, E> Stream for SseEventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(block) = self.take_block() {
                if let Some(event) = parse_block(&block) {
                    return Poll::Ready(Some(Ok(event)));
                }
                continue;
            }

            if self.done {
                // Trailing event without a final blank line
                if self.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                let rest = std::mem::take(&mut self.buffer);
                self.scanned = 0;
                if let Some(event) = parse_block(&rest) {
                    return Poll::Ready(Some(Ok(event)));
                }
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.push_chunk(&chunk),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => self.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use futures::StreamExt;

    use super::*;

    async fn parse(chunks: &[&str]) -> Vec<SseEvent> {
        let owned: Vec<Result<Bytes, Infallible>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.to_string())))
            .collect();
        SseEventStream::new(futures::stream::iter(owned))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn parses_event_and_data() {
        let events = parse(&["event: ping\ndata: {\"a\":1}\n\n"]).await;
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("ping".to_string()),
                data: "{\"a\":1}".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn handles_events_split_across_chunks() {
        let events = parse(&["data: hel", "lo\n", "\ndata: world\n\n"]).await;
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn handles_byte_at_a_time_delivery() {
        let body = "data: {\"text\":\"a long fragment\"}\n\ndata: next\r\n\r\n";
        let chunks: Vec<String> = body.chars().map(String::from).collect();
        let chunks: Vec<&str> = chunks.iter().map(String::as_str).collect();

        let events = parse(&chunks).await;
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["{\"text\":\"a long fragment\"}", "next"]);
    }

    #[test]
    fn take_block_resumes_scan_where_it_stopped() {
        let inner = futures::stream::empty::<Result<Bytes, Infallible>>();
        let mut stream = SseEventStream::new(inner);
        stream.push_chunk(b"data: abc\n");
        assert!(stream.take_block().is_none());
        assert_eq!(stream.scanned, 9);

        stream.push_chunk(b"\ndata: def");
        assert_eq!(stream.take_block().unwrap(), b"data: abc");
        assert_eq!(stream.scanned, 0);
        assert_eq!(stream.buffer, b"data: def");
    }

    #[tokio::test]
    async fn normalizes_crlf_framing() {
        let events = parse(&["data: one\r\n\r\ndata: two\r\n\r\n"]).await;
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn skips_comments_and_joins_multiline_data() {
        let events = parse(&[": keep-alive\n\ndata: a\ndata: b\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }

    #[tokio::test]
    async fn flushes_trailing_event_without_blank_line() {
        let events = parse(&["data: [DONE]"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[DONE]");
    }
}
