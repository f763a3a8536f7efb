//! Server-sent event framing and a small client for reading simulated streams.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use futures_util::stream::{BoxStream, Stream, StreamExt};
use http::Method;
use pin_project_lite::pin_project;
use reqwest::Client;

use crate::{StreamError, StreamResult};

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name (from "event:" field).
    pub event: Option<String>,
    /// Event data ("data:" fields joined with newlines).
    pub data: String,
    /// Event ID (from "id:" field).
    pub id: Option<String>,
    /// Retry interval in milliseconds (from "retry:" field).
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Unnamed event with `data`.
    #[must_use]
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
            retry: None,
        }
    }

    /// Named event with `data`.
    #[must_use]
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self::new(data).with_event(event)
    }

    /// Set the event name.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the event ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether this event has the given name.
    #[must_use]
    pub fn is_event(&self, event_type: &str) -> bool {
        self.event.as_deref() == Some(event_type)
    }

    /// Parse data as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the data is not valid JSON for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Incremental parser turning a byte stream into [`SseEvent`]s.
///
/// Lines may end in `\n`, `\r` or `\r\n`, and a chunk boundary may fall
/// anywhere, including between `\r` and `\n`.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    skip_lf: bool,
    event_type: Option<String>,
    data_lines: Vec<String>,
    event_id: Option<String>,
    retry: Option<u64>,
    last_event_id: Option<String>,
}

impl SseParser {
    /// Empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    pub fn feed(&mut self, data: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(data);
        let mut events = Vec::new();

        loop {
            if self.skip_lf && !self.buffer.is_empty() {
                if self.buffer[0] == b'\n' {
                    self.buffer.advance(1);
                }
                self.skip_lf = false;
            }

            let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r')
            else {
                break;
            };

            let line = self.buffer.split_to(line_end);
            if self.buffer[0] == b'\r' {
                self.skip_lf = true;
            }
            self.buffer.advance(1);

            let line = String::from_utf8_lossy(&line);
            if line.is_empty() {
                if let Some(event) = self.dispatch_event() {
                    events.push(event);
                }
            } else if !line.starts_with(':') {
                self.process_field(&line);
            }
        }

        events
    }

    /// Bytes held for an incomplete line.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Last event ID seen.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn process_field(&mut self, line: &str) {
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            "id" if !value.contains('\0') => self.event_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn dispatch_event(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            self.event_type = None;
            return None;
        }

        let event = SseEvent {
            event: self.event_type.take(),
            data: self.data_lines.join("\n"),
            id: self.event_id.clone(),
            retry: self.retry.take(),
        };
        if event.id.is_some() {
            self.last_event_id.clone_from(&event.id);
        }
        self.data_lines.clear();

        Some(event)
    }
}

/// Client that opens a stream the way an SDK would.
#[derive(Debug, Clone)]
pub struct SseClient {
    url: String,
    method: Method,
    body: Option<Bytes>,
    headers: Vec<(String, String)>,
    max_buffer_size: usize,
    http_client: Client,
}

impl SseClient {
    /// GET client for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            max_buffer_size: 1024 * 1024,
            http_client: Client::new(),
        }
    }

    /// Use another method, such as `REPORT` with a context body.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Send a request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Limit on bytes held for an incomplete event.
    #[must_use]
    pub const fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not a success.
    pub async fn connect(&self) -> StreamResult<SseStream> {
        let mut request = self
            .http_client
            .request(self.method.clone(), &self.url)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::HttpError {
                status: status.as_u16(),
                message: status.to_string(),
            });
        }

        Ok(SseStream::new(
            response.bytes_stream().boxed(),
            self.max_buffer_size,
        ))
    }
}

pin_project! {
    /// Events read from an open stream.
    pub struct SseStream {
        #[pin]
        inner: BoxStream<'static, Result<Bytes, reqwest::Error>>,
        parser: SseParser,
        pending: VecDeque<SseEvent>,
        max_buffer_size: usize,
    }
}

impl SseStream {
    fn new(inner: BoxStream<'static, Result<Bytes, reqwest::Error>>, max_buffer_size: usize) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            max_buffer_size,
        }
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Timeout`] if nothing arrives, [`StreamError::Closed`]
    /// if the server ends the stream, or the underlying read error.
    pub async fn next_event(&mut self, timeout: Duration) -> StreamResult<SseEvent> {
        match tokio::time::timeout(timeout, self.next()).await {
            Ok(Some(result)) => result,
            Ok(None) => Err(StreamError::Closed),
            Err(_) => Err(StreamError::Timeout(timeout)),
        }
    }

    /// Last event ID seen.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.parser.last_event_id()
    }
}

impl Stream for SseStream {
    type Item = StreamResult<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(data))) => {
                    let size = this.parser.buffered() + data.len();
                    if size > *this.max_buffer_size {
                        return Poll::Ready(Some(Err(StreamError::BufferOverflow {
                            size,
                            limit: *this.max_buffer_size,
                        })));
                    }
                    this.pending.extend(this.parser.feed(&data));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(StreamError::ReqwestError(e))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
