//! A single test-scoped virtual endpoint.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::LengthLimitError;
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::registry::RegistryShared;
use crate::{
    EndpointError, EndpointResult, Request, RequestHandler, RequestScope, Response, ScopeFn,
    status_response,
};

/// What an endpoint saw for one request.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI relative to the endpoint (prefix stripped, query kept)
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Buffered request body
    pub body: Bytes,
    /// Arrival time
    pub received_at: DateTime<Utc>,
    scope: RequestScope,
    cancel: CancellationToken,
}

impl IncomingRequest {
    /// Endpoint-relative path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// A header value, if present and valid text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the body is not valid JSON for `T`.
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Scope the handler received for this request.
    #[must_use]
    pub const fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Abort this request: its handler observes cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Options applied when an endpoint is created.
#[derive(Clone, Default)]
pub struct EndpointOptions {
    description: Option<String>,
    scope_fn: Option<ScopeFn>,
}

impl EndpointOptions {
    /// Options with no description and no scope decorator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Human-readable description used in logs and errors.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Decorate each request's scope before the handler sees it.
    #[must_use]
    pub fn with_scope_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(RequestScope) -> RequestScope + Send + Sync + 'static,
    {
        self.scope_fn = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for EndpointOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointOptions")
            .field("description", &self.description)
            .field("scope_fn", &self.scope_fn.is_some())
            .finish()
    }
}

struct EndpointState {
    queue_tx: Option<mpsc::Sender<IncomingRequest>>,
    active: Option<IncomingRequest>,
    outstanding: HashMap<u64, CancellationToken>,
}

pub(crate) struct EndpointShared {
    id: u64,
    address: String,
    label: String,
    handler: Arc<dyn RequestHandler>,
    scope_fn: Option<ScopeFn>,
    max_body_bytes: usize,
    root: CancellationToken,
    registry: Weak<RegistryShared>,
    next_sequence: AtomicU64,
    closed: AtomicBool,
    state: Mutex<EndpointState>,
    queue_rx: tokio::sync::Mutex<mpsc::Receiver<IncomingRequest>>,
}

pub(crate) struct EndpointParams {
    pub id: u64,
    pub address: String,
    pub queue_capacity: usize,
    pub max_body_bytes: usize,
    pub root: CancellationToken,
    pub registry: Weak<RegistryShared>,
}

impl EndpointShared {
    pub(crate) fn new(
        params: EndpointParams,
        handler: Arc<dyn RequestHandler>,
        options: EndpointOptions,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(params.queue_capacity.max(1));
        let description = options
            .description
            .unwrap_or_else(|| format!("endpoint {}", params.id));
        Self {
            id: params.id,
            label: format!("{description} ({})", params.address),
            address: params.address,
            handler,
            scope_fn: options.scope_fn,
            max_body_bytes: params.max_body_bytes,
            root: params.root,
            registry: params.registry,
            next_sequence: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            state: Mutex::new(EndpointState {
                queue_tx: Some(queue_tx),
                active: None,
                outstanding: HashMap::new(),
            }),
            queue_rx: tokio::sync::Mutex::new(queue_rx),
        }
    }

    /// Record the request, run the handler, and keep the request outstanding
    /// until its response body is finished or dropped.
    pub(crate) async fn serve(self: Arc<Self>, request: Request) -> Response {
        let (mut parts, body) = request.into_parts();
        let method = parts.method.clone();
        let path = parts.uri.path().to_owned();

        let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(body) => body,
            Err(err) => {
                let too_large = err.into_inner().is::<LengthLimitError>();
                warn!(
                    endpoint = %self.label,
                    method = %method,
                    path = %path,
                    too_large,
                    "Failed to read request body"
                );
                return status_response(if too_large {
                    StatusCode::PAYLOAD_TOO_LARGE
                } else {
                    StatusCode::BAD_REQUEST
                });
            }
        };

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let cancel = self.root.child_token();
        let mut scope = RequestScope::new(self.id, sequence, cancel.child_token());
        if let Some(decorate) = &self.scope_fn {
            scope = decorate(scope);
        }

        let incoming = IncomingRequest {
            method: method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body: body.clone(),
            received_at: Utc::now(),
            scope: scope.clone(),
            cancel: cancel.clone(),
        };

        {
            let mut state = self.state.lock();
            let pushed = state
                .queue_tx
                .as_ref()
                .map(|queue| queue.try_send(incoming.clone()));
            match pushed {
                None => {
                    drop(state);
                    error!(
                        endpoint = %self.label,
                        method = %method,
                        path = %path,
                        "Received request after endpoint was closed"
                    );
                    return status_response(StatusCode::INTERNAL_SERVER_ERROR);
                }
                Some(Err(TrySendError::Full(_))) => {
                    warn!(
                        endpoint = %self.label,
                        method = %method,
                        path = %path,
                        "Request queue full; request not recorded"
                    );
                }
                Some(Err(TrySendError::Closed(_)) | Ok(())) => {}
            }
            state.active = Some(incoming);
            state.outstanding.insert(sequence, cancel.clone());
        }

        debug!(endpoint = %self.label, method = %method, path = %path, sequence, "Dispatching request");

        let guard = OutstandingGuard {
            endpoint: Arc::clone(&self),
            sequence,
            cancel,
        };

        parts.extensions.insert(scope);
        let response = self
            .handler
            .handle(Request::from_parts(parts, Body::from(body)))
            .await;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            warn!(
                endpoint = %self.label,
                method = %method,
                path = %path,
                status = status.as_u16(),
                "Endpoint handler rejected request"
            );
        }

        guard.attach(response)
    }

    /// Returns `true` only for the call that actually closed the endpoint.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }

        let outstanding: Vec<CancellationToken> = {
            let mut state = self.state.lock();
            state.queue_tx = None;
            state.outstanding.drain().map(|(_, token)| token).collect()
        };

        debug!(
            endpoint = %self.label,
            cancelled = outstanding.len(),
            "Closed endpoint"
        );
        for token in outstanding {
            token.cancel();
        }
        true
    }
}

/// Keeps a request in the outstanding set for as long as its response lives.
struct OutstandingGuard {
    endpoint: Arc<EndpointShared>,
    sequence: u64,
    cancel: CancellationToken,
}

impl OutstandingGuard {
    fn attach(self, response: Response) -> Response {
        let (parts, body) = response.into_parts();
        let stream = GuardedStream {
            inner: body.into_data_stream(),
            guard: self,
        };
        Response::from_parts(parts, Body::from_stream(stream))
    }
}

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        self.endpoint
            .state
            .lock()
            .outstanding
            .remove(&self.sequence);
        self.cancel.cancel();
    }
}

pin_project! {
    struct GuardedStream<S> {
        #[pin]
        inner: S,
        guard: OutstandingGuard,
    }
}

impl<S: Stream> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

/// Handle to a virtual endpoint.
///
/// Dropping the handle closes the endpoint.
pub struct MockEndpoint {
    shared: Arc<EndpointShared>,
}

impl MockEndpoint {
    pub(crate) const fn new(shared: Arc<EndpointShared>) -> Self {
        Self { shared }
    }

    /// Registry-unique id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Public URL of this endpoint. Stable for the endpoint's lifetime.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Description and address, as used in logs and errors.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Wait up to `timeout` for the next recorded request.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Timeout`] if nothing arrives in time, or
    /// [`EndpointError::Closed`] once the endpoint is closed and drained.
    pub async fn await_request(&self, timeout: Duration) -> EndpointResult<IncomingRequest> {
        let received = tokio::time::timeout(timeout, async {
            self.shared.queue_rx.lock().await.recv().await
        })
        .await;

        match received {
            Ok(Some(request)) => Ok(request),
            Ok(None) => Err(EndpointError::Closed {
                endpoint: self.shared.label.clone(),
            }),
            Err(_) => Err(EndpointError::Timeout {
                endpoint: self.shared.label.clone(),
                timeout,
            }),
        }
    }

    /// The most recent request, whether or not it was ever taken from the queue.
    #[must_use]
    pub fn active_request(&self) -> Option<IncomingRequest> {
        self.shared.state.lock().active.clone()
    }

    /// Number of requests whose responses are still in progress.
    #[must_use]
    pub fn outstanding_requests(&self) -> usize {
        self.shared.state.lock().outstanding.len()
    }

    /// Deregister the endpoint and abort every in-flight request.
    ///
    /// Safe to call repeatedly and concurrently; returns `true` only for the
    /// call that performed the close.
    pub fn close(&self) -> bool {
        self.shared.close()
    }

    /// Whether [`MockEndpoint::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl fmt::Debug for MockEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockEndpoint")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndpointRegistry, StaticResponse, handler_fn};
    use fdsim_core::MockServiceConfig;

    const WAIT: Duration = Duration::from_secs(2);

    fn request(endpoint: &MockEndpoint, path: &str, body: &'static str) -> Request {
        http::Request::builder()
            .method("POST")
            .uri(format!("/endpoints/{}{path}", endpoint.id()))
            .body(Body::from(body))
            .unwrap()
    }

    /// Handler that blocks until its scope is cancelled, then answers 499.
    fn blocking_handler() -> impl RequestHandler {
        handler_fn(|request: Request| async move {
            RequestScope::from_request(&request).cancelled().await;
            status_response(StatusCode::from_u16(499).unwrap())
        })
    }

    #[tokio::test]
    async fn test_request_is_recorded_with_metadata() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = registry.create(StaticResponse::new(StatusCode::ACCEPTED), EndpointOptions::new());

        let before = Utc::now();
        let response = registry.dispatch(request(&endpoint, "/bulk", "[]")).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let recorded = endpoint.await_request(WAIT).await.unwrap();
        assert_eq!(recorded.method, Method::POST);
        assert_eq!(recorded.path(), "/bulk");
        assert_eq!(
            recorded.body_json::<Vec<serde_json::Value>>().unwrap(),
            Vec::<serde_json::Value>::new()
        );
        assert!(recorded.received_at >= before);
        assert_eq!(recorded.scope().endpoint_id(), endpoint.id());
    }

    #[tokio::test]
    async fn test_close_cancels_in_flight_requests() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = registry.create(blocking_handler(), EndpointOptions::new());

        let dispatcher = registry.clone();
        let in_flight = tokio::spawn({
            let request = request(&endpoint, "/all", "");
            async move { dispatcher.dispatch(request).await }
        });

        let recorded = endpoint.await_request(WAIT).await.unwrap();
        assert!(!recorded.scope().is_cancelled());
        assert_eq!(endpoint.outstanding_requests(), 1);

        assert!(endpoint.close());
        let response = tokio::time::timeout(WAIT, in_flight).await.unwrap().unwrap();
        assert_eq!(response.status().as_u16(), 499);
        assert!(recorded.scope().is_cancelled());
        assert_eq!(endpoint.outstanding_requests(), 0);

        let response = registry.dispatch(request(&endpoint, "/all", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_outstanding_cleared_when_body_finishes() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = registry.create(StaticResponse::new(StatusCode::OK).with_body("done"), EndpointOptions::new());

        let response = registry.dispatch(request(&endpoint, "/", "")).await;
        assert_eq!(endpoint.outstanding_requests(), 1);

        let recorded = endpoint.await_request(WAIT).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"done");
        assert_eq!(endpoint.outstanding_requests(), 0);
        assert!(recorded.scope().is_cancelled());
    }

    #[tokio::test]
    async fn test_individual_request_cancel() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = registry.create(blocking_handler(), EndpointOptions::new());

        let dispatcher = registry.clone();
        let request = request(&endpoint, "/meval/abc", "");
        let in_flight = tokio::spawn(async move { dispatcher.dispatch(request).await });

        let recorded = endpoint.await_request(WAIT).await.unwrap();
        recorded.cancel();
        let response = tokio::time::timeout(WAIT, in_flight).await.unwrap().unwrap();
        assert_eq!(response.status().as_u16(), 499);
        assert!(!endpoint.is_closed());
    }

    #[tokio::test]
    async fn test_full_queue_drops_but_active_request_tracks_latest() {
        let config = MockServiceConfig::default().with_request_queue_capacity(2);
        let registry = EndpointRegistry::with_config("http://localhost", &config);
        let endpoint = registry.create(StaticResponse::new(StatusCode::OK), EndpointOptions::new());

        for path in ["/1", "/2", "/3"] {
            let response = registry.dispatch(request(&endpoint, path, "")).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(endpoint.active_request().unwrap().path(), "/3");
        assert_eq!(endpoint.await_request(WAIT).await.unwrap().path(), "/1");
        assert_eq!(endpoint.await_request(WAIT).await.unwrap().path(), "/2");
        assert!(matches!(
            endpoint.await_request(Duration::from_millis(50)).await,
            Err(EndpointError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let config = MockServiceConfig::default().with_max_body_bytes(4);
        let registry = EndpointRegistry::with_config("http://localhost", &config);
        let endpoint = registry.create(StaticResponse::new(StatusCode::OK), EndpointOptions::new());

        let response = registry.dispatch(request(&endpoint, "/bulk", "too long")).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(endpoint.active_request().is_none());
    }

    #[tokio::test]
    async fn test_scope_fn_decorates_scope() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = registry.create(
            blocking_handler(),
            EndpointOptions::new()
                .with_scope_fn(|scope: RequestScope| scope.with_timeout(Duration::from_millis(20))),
        );

        let response = tokio::time::timeout(WAIT, registry.dispatch(request(&endpoint, "/", "")))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 499);
        assert!(!endpoint.is_closed());
    }

    #[tokio::test]
    async fn test_concurrent_close_runs_once() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = Arc::new(registry.create(blocking_handler(), EndpointOptions::new()));

        let closers: Vec<_> = (0..8)
            .map(|_| {
                let endpoint = Arc::clone(&endpoint);
                tokio::spawn(async move { endpoint.close() })
            })
            .collect();

        let mut performed = 0;
        for closer in closers {
            if closer.await.unwrap() {
                performed += 1;
            }
        }
        assert_eq!(performed, 1);
        assert!(registry.is_empty());
        assert!(matches!(
            endpoint.await_request(WAIT).await,
            Err(EndpointError::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_request_reaching_closed_endpoint_is_server_error() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = registry.create(StaticResponse::new(StatusCode::OK), EndpointOptions::new());
        let shared = Arc::clone(&endpoint.shared);

        assert!(endpoint.close());
        let late = http::Request::builder()
            .method("GET")
            .uri("/late")
            .body(Body::empty())
            .unwrap();
        let response = shared.serve(late).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(endpoint.active_request().is_none());
        assert_eq!(endpoint.outstanding_requests(), 0);
    }

    #[test]
    fn test_default_label_uses_id_and_address() {
        let registry = EndpointRegistry::new("http://localhost");
        let endpoint = registry.create(StaticResponse::new(StatusCode::OK), EndpointOptions::new());
        assert_eq!(
            endpoint.label(),
            format!("endpoint {} ({})", endpoint.id(), endpoint.address())
        );
    }
}
