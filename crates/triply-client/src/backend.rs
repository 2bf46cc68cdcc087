//! Generation backends.
//!
//! A backend performs the start handshake and opens the event stream. The
//! session controller only sees the [`GenerationBackend`] trait, so tests can
//! script frames without a server.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use triply_protocol::{RawFrame, SseDecoder, lenient};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Frames as they come off the transport.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame>> + Send>>;

/// Body of the start handshake.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<Value>,
    /// Set for modification sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
}

impl StartRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.conversation_context = Some(context);
        self
    }

    #[must_use]
    pub fn with_trip_id(mut self, trip_id: impl Into<String>) -> Self {
        self.trip_id = Some(trip_id.into());
        self
    }
}

/// Job id and stream location returned by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub trip_id: String,
    pub stream_url: String,
}

/// Source of generation streams.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Starts a generation job.
    async fn start(&self, request: &StartRequest) -> Result<StreamHandle>;

    /// Opens the event stream for a started job.
    async fn open_stream(&self, handle: &StreamHandle) -> Result<FrameStream>;
}

#[derive(Deserialize)]
struct StartResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<StartData>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartData {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    trip_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    stream_url: Option<String>,
}

/// Pulls a human-readable message out of an error body.
///
/// Accepts `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; falls back to the raw text.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let error = value.get("error");
    error
        .and_then(|e| e.get("message"))
        .or(error)
        .or_else(|| value.get("message"))
        .and_then(lenient::text)
        .unwrap_or_else(|| body.trim().to_string())
}

/// HTTP backend speaking the start/stream protocol.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    start_path: String,
    timeout: std::time::Duration,
    client: Client,
}

impl HttpBackend {
    /// Creates a backend from client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // No client-wide timeout: the stream stays open for minutes.
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &ClientConfig, client: Client) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            start_path: config.start_path().to_string(),
            timeout: config.request_timeout(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a stream location against the base URL. Absolute URLs are kept.
    pub fn stream_url(&self, handle: &StreamHandle) -> String {
        let url = &handle.stream_url;
        if url.starts_with("http://") || url.starts_with("https://") {
            url.clone()
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }

    async fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        let message = error_message(&body);
        error!(
            status = %status,
            error = %message,
            url = %url,
            "Generation API returned error status"
        );
        Err(ClientError::Status { status: status.as_u16(), message })
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn start(&self, request: &StartRequest) -> Result<StreamHandle> {
        let url = format!("{}{}", self.base_url, self.start_path);
        debug!(url = %url, trip_id = ?request.trip_id, "Starting generation");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %url, "Failed to send start request");
                ClientError::Request(format!("Network error: {}", e))
            })?;
        let response = Self::check_status(response, &url).await?;

        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Handshake(format!("Invalid start response: {}", e)))?;

        if !body.success {
            let message = body
                .error
                .as_ref()
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(lenient::text)
                .unwrap_or_else(|| "Failed to start generation".to_string());
            return Err(ClientError::Handshake(message));
        }

        let handshake = |message: &str| ClientError::Handshake(message.to_string());
        let data = body.data.ok_or_else(|| handshake("Response has no data"))?;
        let trip_id = data.trip_id.ok_or_else(|| handshake("Missing tripId"))?;
        let stream_url = data.stream_url.ok_or_else(|| handshake("Missing streamUrl"))?;

        debug!(trip_id = %trip_id, stream_url = %stream_url, "Generation started");
        Ok(StreamHandle { trip_id, stream_url })
    }

    async fn open_stream(&self, handle: &StreamHandle) -> Result<FrameStream> {
        let url = self.stream_url(handle);
        debug!(url = %url, "Opening event stream");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %url, "Failed to open event stream");
                ClientError::Connection(format!("Network error: {}", e))
            })?;
        let response = Self::check_status(response, &url).await?;

        Ok(Box::pin(SseFrameStream::new(Box::pin(response.bytes_stream()))))
    }
}

/// Adapts a byte stream into SSE frames.
pub struct SseFrameStream<S> {
    inner: S,
    decoder: SseDecoder,
    ready: VecDeque<RawFrame>,
    done: bool,
}

impl<S> SseFrameStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, decoder: SseDecoder::new(), ready: VecDeque::new(), done: false }
    }
}

impl<S> Stream for SseFrameStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<RawFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let frames = self.decoder.push(&bytes);
                    self.ready.extend(frames);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    let error = ClientError::Connection(format!("Stream error: {}", e));
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) => {
                    // Stream ended - flush any unterminated frame
                    self.done = true;
                    if let Some(frame) = self.decoder.finish() {
                        self.ready.push_back(frame);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn config_for(server: &mockito::ServerGuard) -> ClientConfig {
        ClientConfig { base_url: Some(server.url()), ..Default::default() }
    }

    #[test]
    fn test_start_request_serialization() {
        let request = StartRequest::new("3 days in Paris")
            .with_context(serde_json::json!({"messages": []}))
            .with_trip_id("trip-1");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["query"], "3 days in Paris");
        assert!(value.get("conversationContext").is_some());
        assert_eq!(value["tripId"], "trip-1");

        let bare = serde_json::to_value(StartRequest::new("x")).unwrap();
        assert!(bare.get("conversationContext").is_none());
        assert!(bare.get("tripId").is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error": {"message": "Rate limited"}}"#), "Rate limited");
        assert_eq!(error_message(r#"{"error": "Bad query"}"#), "Bad query");
        assert_eq!(error_message(r#"{"message": "Nope"}"#), "Nope");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn test_stream_url_resolution() {
        let backend = HttpBackend::with_client(
            &ClientConfig { base_url: Some("http://api:3000/".to_string()), ..Default::default() },
            Client::new(),
        );
        let handle = |url: &str| StreamHandle { trip_id: "t".into(), stream_url: url.into() };
        assert_eq!(
            backend.stream_url(&handle("/api/trips/t/stream")),
            "http://api:3000/api/trips/t/stream"
        );
        assert_eq!(backend.stream_url(&handle("stream/t")), "http://api:3000/stream/t");
        assert_eq!(backend.stream_url(&handle("https://cdn/s")), "https://cdn/s");
    }

    #[tokio::test]
    async fn test_start_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/trips/generate/stream")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"query": "Paris"}"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "success": true,
                    "data": {"tripId": "trip-1", "streamUrl": "/api/trips/trip-1/stream"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let handle = backend.start(&StartRequest::new("Paris")).await.unwrap();

        assert_eq!(handle.trip_id, "trip-1");
        assert_eq!(handle.stream_url, "/api/trips/trip-1/stream");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_start_missing_stream_url_is_handshake_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/trips/generate/stream")
            .with_status(200)
            .with_body(r#"{"success": true, "data": {"tripId": "trip-1"}}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let result = backend.start(&StartRequest::new("Paris")).await;
        assert!(matches!(result, Err(ClientError::Handshake(msg)) if msg.contains("streamUrl")));
    }

    #[tokio::test]
    async fn test_start_unsuccessful_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/trips/generate/stream")
            .with_status(200)
            .with_body(r#"{"success": false, "error": {"message": "Query too vague"}}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let result = backend.start(&StartRequest::new("?")).await;
        assert!(matches!(result, Err(ClientError::Handshake(msg)) if msg == "Query too vague"));
    }

    #[tokio::test]
    async fn test_start_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/trips/generate/stream")
            .with_status(429)
            .with_body(r#"{"error": {"message": "Too many requests"}}"#)
            .create_async()
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let result = backend.start(&StartRequest::new("Paris")).await;
        match result {
            Err(ClientError::Status { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "Too many requests");
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_stream_yields_frames() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/trips/trip-1/stream")
            .match_header("accept", "text/event-stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "event: connected\ndata: {\"tripId\":\"trip-1\"}\n\n\
                 : ping\n\n\
                 event: init\ndata: {\"progress\":0.05}\n\n\
                 event: complete\ndata: {\"data\":{\"tripId\":\"trip-1\"}}",
            )
            .create_async()
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let handle = StreamHandle {
            trip_id: "trip-1".into(),
            stream_url: "/api/trips/trip-1/stream".into(),
        };
        let frames: Vec<_> = backend.open_stream(&handle).await.unwrap().collect().await;

        let tags: Vec<_> =
            frames.iter().map(|f| f.as_ref().unwrap().event.clone().unwrap()).collect();
        assert_eq!(tags, vec!["connected", "init", "complete"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_open_stream_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone")
            .with_status(404)
            .with_body("Not found")
            .create_async()
            .await;

        let backend = HttpBackend::new(&config_for(&server)).unwrap();
        let handle = StreamHandle { trip_id: "t".into(), stream_url: "/gone".into() };
        let result = backend.open_stream(&handle).await;
        assert!(matches!(result, Err(ClientError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_sse_frame_stream_over_chunks() {
        let chunks: Vec<std::result::Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"event: day\ndata: {\"data\":")),
            Ok(Bytes::from_static(b"{\"dayNumber\":1}}\n\nevent: init\n")),
            Ok(Bytes::from_static(b"data: {}\n\n")),
        ];
        let stream = SseFrameStream::new(futures::stream::iter(chunks));
        let frames: Vec<_> = stream.map(|f| f.unwrap()).collect().await;
        assert_eq!(
            frames,
            vec![RawFrame::new("day", "{\"data\":{\"dayNumber\":1}}"), RawFrame::new("init", "{}")]
        );
    }
}
