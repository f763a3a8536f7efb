//! The event intake sink.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use fdsim_core::SdkKind;
use fdsim_core::routes::{RouteMatch, RouteTable, diagnostic_event_routes, event_batch_routes};
use fdsim_endpoints::{Request, RequestHandler, RequestScope, Response, status_response};
use http::StatusCode;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::EventBatch;

/// Simulated analytics intake for one SDK kind.
///
/// Batches are queued with back-pressure: when the queue is full the
/// request waits for room instead of dropping the batch.
#[derive(Debug)]
pub struct EventsService {
    kind: SdkKind,
    batch_routes: RouteTable,
    diagnostic_routes: RouteTable,
    tx: mpsc::Sender<EventBatch>,
    rx: Mutex<mpsc::Receiver<EventBatch>>,
}

impl EventsService {
    /// Sink for `kind` holding up to `capacity` unread batches.
    #[must_use]
    pub fn new(kind: SdkKind, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            kind,
            batch_routes: event_batch_routes(kind),
            diagnostic_routes: diagnostic_event_routes(kind),
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// SDK kind served.
    #[must_use]
    pub const fn kind(&self) -> SdkKind {
        self.kind
    }

    /// Wait up to `timeout` for the next batch.
    pub async fn await_batch(&self, timeout: Duration) -> Option<EventBatch> {
        tokio::time::timeout(timeout, async { self.rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    async fn accept_batch(&self, request: Request) -> Response {
        let scope = RequestScope::from_request(&request);
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_owned();

        let body = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(err) => {
                warn!(kind = %self.kind, path = %path, error = %err, "Failed to read event payload");
                return status_response(StatusCode::BAD_REQUEST);
            }
        };

        let batch = match EventBatch::parse(path.clone(), parts.headers, &body) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    kind = %self.kind,
                    path = %path,
                    error = %err,
                    payload = %String::from_utf8_lossy(&body),
                    "Rejected malformed event payload"
                );
                let mut response = Response::new(Body::from(err.to_string()));
                *response.status_mut() = StatusCode::BAD_REQUEST;
                return response;
            }
        };

        let count = batch.len();
        tokio::select! {
            sent = self.tx.send(batch) => {
                if sent.is_err() {
                    return status_response(StatusCode::SERVICE_UNAVAILABLE);
                }
            }
            () = scope.cancelled() => {
                warn!(kind = %self.kind, path = %path, "Event batch abandoned while waiting for queue space");
                return status_response(StatusCode::SERVICE_UNAVAILABLE);
            }
        }

        debug!(kind = %self.kind, path = %path, events = count, "Accepted event batch");
        status_response(StatusCode::ACCEPTED)
    }
}

#[async_trait]
impl RequestHandler for EventsService {
    async fn handle(&self, request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        match self.batch_routes.resolve(&method, &path) {
            RouteMatch::Matched(_) => return self.accept_batch(request).await,
            RouteMatch::MethodNotAllowed => return status_response(StatusCode::METHOD_NOT_ALLOWED),
            RouteMatch::NotFound => {}
        }

        match self.diagnostic_routes.resolve(&method, &path) {
            RouteMatch::Matched(_) => {
                debug!(kind = %self.kind, path = %path, "Discarded diagnostic event");
                status_response(StatusCode::ACCEPTED)
            }
            RouteMatch::MethodNotAllowed => status_response(StatusCode::METHOD_NOT_ALLOWED),
            RouteMatch::NotFound => {
                warn!(kind = %self.kind, path = %path, "Unknown event intake path");
                status_response(StatusCode::NOT_FOUND)
            }
        }
    }
}
