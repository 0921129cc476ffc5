//! Server-Sent Events subscription to `/api/events`.

use futures::{Stream, StreamExt};
use reqwest::Method;
use tracing::{debug, warn};

use charla_shared::events::{ChangeEvent, Topic};

use crate::api::{check, ApiClient};
use crate::error::{ClientError, Result};

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Chunks may split lines and
/// multi-byte characters anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment, used for keep-alives.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

/// Decode a frame's payload into a [`ChangeEvent`].
pub fn parse_frame(frame: &SseFrame) -> Result<ChangeEvent> {
    let event: ChangeEvent = serde_json::from_str(&frame.data)?;
    if let Some(name) = &frame.event {
        if name != event.topic().as_str() {
            return Err(ClientError::Stream(format!(
                "event name {name} does not match payload type {}",
                event.topic().as_str()
            )));
        }
    }
    Ok(event)
}

/// Open a subscription. The first items are the current snapshots, then
/// one item per change. Dropping the stream closes the connection.
///
/// An empty `topics` list subscribes to everything the caller may see.
pub async fn subscribe(
    api: &ApiClient,
    topics: &[Topic],
    chat_id: Option<&str>,
) -> Result<impl Stream<Item = Result<ChangeEvent>> + Send + 'static> {
    let topic = topics
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let mut query = vec![("topic", topic)];
    if let Some(chat) = chat_id {
        query.push(("chat", chat.to_string()));
    }

    let resp = api
        .request(Method::GET, "/api/events")
        .query(&query)
        .send()
        .await?;
    let resp = check(resp).await?;
    debug!(?topics, ?chat_id, "Subscribed to events");

    let mut decoder = SseDecoder::new();
    let stream = resp
        .bytes_stream()
        .map(move |chunk| match chunk {
            Ok(bytes) => decoder
                .push(&bytes)
                .iter()
                .map(|frame| {
                    let parsed = parse_frame(frame);
                    if let Err(e) = &parsed {
                        warn!(error = %e, "Undecodable event");
                    }
                    parsed
                })
                .collect::<Vec<_>>(),
            Err(e) => vec![Err(ClientError::from(e))],
        })
        .flat_map(futures::stream::iter);

    Ok(stream)
}
