//! Server-sent-events decoding for the live status and monitor feeds.
//!
//! The service emits `data: <json>` lines, one JSON object per line. Blank
//! lines are keep-alives and unparseable lines are skipped with a warning;
//! a broken event must not kill a long-lived feed. Stream responses are
//! never cached and individual events are never retried.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{ready, Stream, StreamExt};
use sandpit_core::{Result, SandpitError};
use serde::de::DeserializeOwned;
use tracing::warn;

type ByteChunks = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Decoded SSE feed yielding one deserialized event per `data:` line
pub struct SseStream<T> {
    chunks: ByteChunks,
    buf: String,
    pending: VecDeque<T>,
    done: bool,
}

impl<T: DeserializeOwned> SseStream<T> {
    /// Wrap a raw byte-chunk stream (e.g. `reqwest::Response::bytes_stream`)
    pub(crate) fn new<S, B, E>(chunks: S) -> Self
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send,
        E: std::fmt::Display,
    {
        let mapped = chunks.map(|item| {
            item.map(|b| b.as_ref().to_vec())
                .map_err(|e| SandpitError::Http(e.to_string()))
        });
        Self {
            chunks: Box::pin(mapped),
            buf: String::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Parse every complete line currently buffered
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            if let Some(event) = parse_sse_line(&line) {
                self.pending.push_back(event);
            }
        }
    }
}

impl<T: DeserializeOwned + Unpin> Stream for SseStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }
            match ready!(this.chunks.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    this.buf.push_str(&String::from_utf8_lossy(&chunk));
                    this.drain_lines();
                }
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.done = true;
                    // a final line without a trailing newline still counts
                    let rest = std::mem::take(&mut this.buf);
                    if let Some(event) = parse_sse_line::<T>(&rest) {
                        return Poll::Ready(Some(Ok(event)));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// Decode one SSE line. Returns `None` for keep-alives, non-data lines and
/// payloads that fail to parse.
fn parse_sse_line<T: DeserializeOwned>(line: &str) -> Option<T> {
    let line = line.trim();
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "skipping unparseable stream event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use sandpit_core::StatusUpdate;

    fn chunks(parts: &[&str]) -> Vec<std::result::Result<Vec<u8>, std::io::Error>> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    fn event(task_id: &str, progress: u8, completed: bool) -> String {
        format!(
            "data: {{\"task\":{{\"task_id\":\"{task_id}\",\"progress\":{progress}}},\"completed\":{completed}}}\n"
        )
    }

    #[tokio::test]
    async fn test_decodes_data_lines() {
        let input = chunks(&[&event("t1", 10, false), &event("t1", 100, true)]);
        let mut sse = SseStream::<StatusUpdate>::new(stream::iter(input));

        let first = sse.next().await.unwrap().unwrap();
        assert_eq!(first.task.progress, 10);
        let second = sse.next().await.unwrap().unwrap();
        assert!(second.completed);
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        let whole = event("t2", 55, false);
        let (a, b) = whole.split_at(17);
        let input = chunks(&[a, b]);
        let mut sse = SseStream::<StatusUpdate>::new(stream::iter(input));

        let update = sse.next().await.unwrap().unwrap();
        assert_eq!(update.task.task_id, "t2");
        assert_eq!(update.task.progress, 55);
    }

    #[tokio::test]
    async fn test_skips_blank_and_garbage_lines() {
        let input = chunks(&[
            "\n",
            ": comment\n",
            "data: {not json}\n",
            &event("t3", 80, false),
        ]);
        let mut sse = SseStream::<StatusUpdate>::new(stream::iter(input));

        let update = sse.next().await.unwrap().unwrap();
        assert_eq!(update.task.task_id, "t3");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let whole = event("t4", 100, true);
        let input = chunks(&[whole.trim_end()]);
        let mut sse = SseStream::<StatusUpdate>::new(stream::iter(input));

        let update = sse.next().await.unwrap().unwrap();
        assert!(update.completed);
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_terminates_stream() {
        let input: Vec<std::result::Result<Vec<u8>, std::io::Error>> = vec![
            Ok(event("t5", 20, false).into_bytes()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut sse = SseStream::<StatusUpdate>::new(stream::iter(input));

        assert!(sse.next().await.unwrap().is_ok());
        assert!(matches!(
            sse.next().await.unwrap(),
            Err(SandpitError::Http(_))
        ));
        assert!(sse.next().await.is_none());
    }
}
