//! SSE (Server-Sent Events) decoding for prediction streams.
//!
//! Buffers incoming bytes, splits on newlines, and assembles `event:`,
//! `data:`, `id:` and `retry:` fields into events. A blank line dispatches
//! the pending event. `done` ends the stream and `error` fails it.

use super::loud_wire;
use crate::errors::ReplicateError;
use crate::streaming::{EventKind, ServerSentEvent};
use async_stream::try_stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::str;

/// Accumulates fields until a blank line completes an event.
#[derive(Debug, Default)]
struct SseDecoder {
    event: Option<String>,
    data: Vec<String>,
    last_event_id: String,
    retry: Option<u64>,
}

impl SseDecoder {
    fn decode(&mut self, line: &str) -> Option<ServerSentEvent> {
        if line.is_empty() {
            if self.event.is_none() && self.data.is_empty() {
                self.retry = None;
                return None;
            }
            let event = self.event.take().unwrap_or_default();
            return Some(ServerSentEvent {
                event: EventKind::from_name(&event),
                data: std::mem::take(&mut self.data).join("\n"),
                id: self.last_event_id.clone(),
                retry: self.retry.take(),
            });
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.last_event_id = value.to_string(),
            "retry" => {
                if let Ok(millis) = value.parse() {
                    self.retry = Some(millis);
                }
            }
            _ => {}
        }
        None
    }
}

/// Parses an SSE byte stream into prediction events.
///
/// The stream ends after a `done` event and yields
/// [`ReplicateError::Stream`] for an `error` event.
pub fn parse_sse_stream(
    byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send,
    request_id: usize,
) -> impl Stream<Item = Result<ServerSentEvent, ReplicateError>> + Send {
    try_stream! {
        futures_util::pin_mut!(byte_stream);
        let mut buffer = Vec::new();
        let mut decoder = SseDecoder::default();
        let mut finished = false;

        'chunks: while let Some(chunk_result) = byte_stream.next().await {
            let chunk: Bytes = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line_bytes = buffer.drain(..=newline_pos).collect::<Vec<u8>>();
                let line = str::from_utf8(&line_bytes)?.trim_end_matches(['\n', '\r']);

                if let Some(event) = decoder.decode(line) {
                    loud_wire::log_sse_event(request_id, event.event.as_str(), &event.data);
                    match event.event {
                        EventKind::Done => {
                            finished = true;
                            break 'chunks;
                        }
                        EventKind::Error => {
                            Err::<(), _>(ReplicateError::Stream(event.data))?;
                        }
                        _ => {
                            yield event;
                        }
                    }
                }
            }
        }

        // A final event without a trailing blank line is still dispatched.
        if !finished {
            let tail = str::from_utf8(&buffer)?.trim_end_matches(['\n', '\r']).to_string();
            let mut pending = decoder.decode(&tail).into_iter().collect::<Vec<_>>();
            pending.extend(decoder.decode(""));
            for event in pending {
                match event.event {
                    EventKind::Done => {}
                    EventKind::Error => {
                        Err::<(), _>(ReplicateError::Stream(event.data))?;
                    }
                    _ => {
                        yield event;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{pin_mut, stream};

    async fn collect(chunks: Vec<&'static str>) -> Vec<Result<ServerSentEvent, ReplicateError>> {
        let byte_stream = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect::<Vec<_>>(),
        );
        let parsed = parse_sse_stream(byte_stream, 0);
        pin_mut!(parsed);
        let mut out = Vec::new();
        while let Some(item) = parsed.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_output_events_then_done() {
        let events = collect(vec![
            "event: output\nid: 1\ndata: Shall I\n\nevent: output\nid: 2\ndata:  compare\n\nevent: done\ndata: {}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 2);
        let first = events[0].as_ref().unwrap();
        assert_eq!(first.event, EventKind::Output);
        assert_eq!(first.data, "Shall I");
        assert_eq!(first.id, "1");
        assert_eq!(events[1].as_ref().unwrap().data, " compare");
    }

    #[tokio::test]
    async fn test_chunked_lines_are_reassembled() {
        let events = collect(vec!["event: out", "put\ndata: hel", "lo\n\n"]).await;
        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.event, EventKind::Output);
        assert_eq!(event.data, "hello");
    }

    #[tokio::test]
    async fn test_multiline_data_joined() {
        let events = collect(vec!["event: logs\ndata: line one\ndata: line two\n\n"]).await;
        assert_eq!(events[0].as_ref().unwrap().data, "line one\nline two");
    }

    #[tokio::test]
    async fn test_comments_and_retry() {
        let events = collect(vec![": keepalive\nretry: 3000\ndata: hi\n\n"]).await;
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.event, EventKind::Message);
        assert_eq!(event.retry, Some(3000));
    }

    #[tokio::test]
    async fn test_done_stops_stream() {
        let events = collect(vec!["event: done\ndata: {}\n\nevent: output\ndata: late\n\n"]).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_error_event_fails_stream() {
        let events = collect(vec!["event: error\ndata: CUDA out of memory\n\n"]).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(ReplicateError::Stream(message)) => assert_eq!(message, "CUDA out of memory"),
            other => panic!("expected stream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_crlf_line_endings() {
        let events = collect(vec!["event: output\r\ndata: x\r\n\r\n"]).await;
        assert_eq!(events[0].as_ref().unwrap().data, "x");
    }

    #[tokio::test]
    async fn test_trailing_event_without_blank_line() {
        let events = collect(vec!["event: output\ndata: tail"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().data, "tail");
    }

    #[test]
    fn test_id_with_null_is_ignored() {
        let mut decoder = SseDecoder::default();
        decoder.decode("id: good");
        decoder.decode("id: bad\0id");
        decoder.decode("data: x");
        assert_eq!(decoder.decode("").unwrap().id, "good");
    }
}
