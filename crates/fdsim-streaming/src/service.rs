//! The streaming simulator.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use fdsim_core::routes::{RouteMatch, RouteTable, streaming_routes};
use fdsim_core::{DataNamespace, SdkData, SdkKind};
use fdsim_endpoints::{Request, RequestHandler, RequestScope, Response, status_response};
use futures_util::StreamExt;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::{SseEvent, delete_event, patch_event, put_event};

struct StreamState {
    current_data: SdkData,
    queued_events: Vec<SseEvent>,
    started: bool,
    subscribers: Vec<mpsc::UnboundedSender<SseEvent>>,
}

impl StreamState {
    fn broadcast(&mut self, event: &SseEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

/// Simulated streaming service for one SDK kind.
///
/// Mount it on an endpoint (usually behind an `Arc`, so the test keeps a
/// handle for pushing events). Each subscriber first receives a `put` with
/// the current dataset, then live events in push order. Events pushed
/// before anyone subscribes are held and delivered to the first subscriber
/// only, right after its `put`.
pub struct StreamingService {
    kind: SdkKind,
    routes: RouteTable,
    keepalive: Option<Duration>,
    state: Mutex<StreamState>,
}

impl StreamingService {
    /// Service for `kind` starting from `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the shape `kind` expects.
    #[must_use]
    pub fn new(kind: SdkKind, data: impl Into<SdkData>) -> Self {
        let data = data.into();
        check_data(kind, &data);
        Self {
            kind,
            routes: streaming_routes(kind),
            keepalive: None,
            state: Mutex::new(StreamState {
                current_data: data,
                queued_events: Vec::new(),
                started: false,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Send keep-alive comments at `interval` on every subscription.
    #[must_use]
    pub const fn with_keepalive(mut self, interval: Duration) -> Self {
        self.keepalive = Some(interval);
        self
    }

    /// SDK kind served.
    #[must_use]
    pub const fn kind(&self) -> SdkKind {
        self.kind
    }

    /// Send an event to every subscriber, or hold it for the first one.
    ///
    /// # Panics
    ///
    /// Panics if `name` contains a line break, or if `data` contains a
    /// carriage return. Multi-line data must use `\n` only, which the wire
    /// format carries as separate `data:` lines.
    pub fn push_event(&self, name: &str, data: impl Into<String>) {
        assert!(
            !name.contains(['\n', '\r']),
            "stream event name must be a single line: {name:?}"
        );
        let data = data.into();
        assert!(
            !data.contains('\r'),
            "stream event data must not contain carriage returns: {data:?}"
        );
        self.push(SseEvent::named(name, data));
    }

    /// Send a `patch` for one item.
    ///
    /// # Panics
    ///
    /// Panics if the item cannot be represented for this SDK kind
    /// (see [`patch_event`]).
    pub fn push_update(&self, namespace: DataNamespace, key: &str, version: u64, item: Value) {
        self.push(patch_event(self.kind, namespace, key, version, item));
    }

    /// Send a `delete` for one item.
    ///
    /// # Panics
    ///
    /// Panics if `namespace` is not flags on a client-side stream.
    pub fn push_delete(&self, namespace: DataNamespace, key: &str, version: u64) {
        self.push(delete_event(self.kind, namespace, key, version));
    }

    /// Replace the dataset and resend it to every current subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the shape this service's kind expects.
    pub fn set_initial_data(&self, data: impl Into<SdkData>) {
        let data = data.into();
        check_data(self.kind, &data);
        let mut state = self.state.lock();
        state.current_data = data;
        let put = put_event(&state.current_data);
        state.broadcast(&put);
    }

    /// Resend the current dataset to every current subscriber.
    pub fn refresh_all(&self) {
        let mut state = self.state.lock();
        let put = put_event(&state.current_data);
        state.broadcast(&put);
    }

    /// Snapshot of the current dataset.
    #[must_use]
    pub fn current_data(&self) -> SdkData {
        self.state.lock().current_data.clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|subscriber| !subscriber.is_closed());
        state.subscribers.len()
    }

    /// Whether any subscriber has ever connected.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    fn push(&self, event: SseEvent) {
        let mut state = self.state.lock();
        if state.started {
            state.broadcast(&event);
        } else {
            debug!(kind = %self.kind, event = ?event.event, "Queued stream event until first subscriber");
            state.queued_events.push(event);
        }
    }

    /// Register a subscriber. The replay is queued on its channel before it
    /// becomes visible to pushes, so nothing can overtake it.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SseEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();

        let mut replay = vec![put_event(&state.current_data)];
        if !state.started {
            state.started = true;
            replay.append(&mut state.queued_events);
        }
        for event in replay {
            // rx is still held here, so this cannot fail
            let _ = tx.send(event);
        }

        state.subscribers.push(tx);
        debug!(kind = %self.kind, subscribers = state.subscribers.len(), "Stream subscriber connected");
        rx
    }
}

fn check_data(kind: SdkKind, data: &SdkData) {
    assert!(
        data.kind_matches(kind),
        "{kind} stream cannot serve this dataset shape"
    );
}

fn to_sse(event: SseEvent) -> Result<Event, Infallible> {
    let mut sse = Event::default().data(event.data);
    if let Some(name) = event.event {
        sse = sse.event(name);
    }
    if let Some(id) = event.id {
        sse = sse.id(id);
    }
    Ok(sse)
}

#[async_trait]
impl RequestHandler for StreamingService {
    async fn handle(&self, request: Request) -> Response {
        match self.routes.resolve(request.method(), request.uri().path()) {
            RouteMatch::Matched(_) => {}
            RouteMatch::MethodNotAllowed => return status_response(StatusCode::METHOD_NOT_ALLOWED),
            RouteMatch::NotFound => {
                warn!(kind = %self.kind, path = %request.uri().path(), "Unknown stream path");
                return status_response(StatusCode::NOT_FOUND);
            }
        }

        let scope = RequestScope::from_request(&request);
        let events = UnboundedReceiverStream::new(self.subscribe())
            .map(to_sse)
            .take_until(async move { scope.cancelled().await });

        let sse = Sse::new(events);
        match self.keepalive {
            Some(interval) => sse
                .keep_alive(KeepAlive::new().interval(interval))
                .into_response(),
            None => sse.into_response(),
        }
    }
}

impl std::fmt::Debug for StreamingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingService")
            .field("kind", &self.kind)
            .field("keepalive", &self.keepalive)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdsim_core::{ClientFlag, ClientSdkData, ServerSdkData};
    use serde_json::json;
    use std::sync::Arc;

    fn server_service() -> StreamingService {
        StreamingService::new(
            SdkKind::ServerSide,
            ServerSdkData::new().with_flag("f", json!({"key": "f", "version": 1})),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SseEvent>) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_first_subscriber_gets_put_then_backlog() {
        let service = server_service();
        service.push_event("e1", "1");
        service.push_event("e2", "2");
        assert!(!service.is_started());

        let mut first = service.subscribe();
        let names: Vec<_> = drain(&mut first).into_iter().map(|e| e.event).collect();
        assert_eq!(
            names,
            vec![Some("put".into()), Some("e1".into()), Some("e2".into())]
        );

        service.push_event("e3", "3");
        assert_eq!(drain(&mut first), vec![SseEvent::named("e3", "3")]);
    }

    #[test]
    fn test_backlog_goes_to_first_subscriber_only() {
        let service = server_service();
        service.push_event("e1", "1");

        let mut first = service.subscribe();
        let mut second = service.subscribe();

        assert_eq!(drain(&mut first).len(), 2);
        let second_events = drain(&mut second);
        assert_eq!(second_events.len(), 1);
        assert!(second_events[0].is_event("put"));
    }

    #[test]
    fn test_put_reflects_data_at_subscription() {
        let service = server_service();
        service.set_initial_data(ServerSdkData::new().with_flag("g", json!({"key": "g"})));

        let mut rx = service.subscribe();
        let put = drain(&mut rx).remove(0);
        let payload: Value = put.json().unwrap();
        assert!(payload["data"]["flags"].get("g").is_some());
        assert!(payload["data"]["flags"].get("f").is_none());
    }

    #[test]
    fn test_set_initial_data_resends_put_to_subscribers() {
        let service = server_service();
        let mut rx = service.subscribe();
        drain(&mut rx);

        service.set_initial_data(ServerSdkData::new());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_event("put"));

        service.refresh_all();
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_subscriber_count_prunes_disconnected() {
        let service = server_service();
        let first = service.subscribe();
        let _second = service.subscribe();
        assert_eq!(service.subscriber_count(), 2);

        drop(first);
        assert_eq!(service.subscriber_count(), 1);
    }

    #[test]
    fn test_client_update_and_delete() {
        let service = StreamingService::new(
            SdkKind::Mobile,
            ClientSdkData::new().with_flag("f", ClientFlag::new(json!(true), 1)),
        );
        let mut rx = service.subscribe();
        drain(&mut rx);

        service.push_update(DataNamespace::Flags, "f", 2, json!({"value": false}));
        service.push_delete(DataNamespace::Flags, "f", 3);

        let events = drain(&mut rx);
        assert!(events[0].is_event("patch"));
        assert_eq!(events[1].json::<Value>().unwrap(), json!({"key": "f", "version": 3}));
    }

    #[test]
    #[should_panic(expected = "can only carry flags")]
    fn test_client_segment_update_panics() {
        let service = StreamingService::new(SdkKind::JsClient, ClientSdkData::new());
        service.push_update(DataNamespace::Segments, "s", 1, json!({}));
    }

    #[test]
    fn test_multi_line_data_is_accepted() {
        let service = server_service();
        let mut rx = service.subscribe();
        drain(&mut rx);

        service.push_event("note", "line1\nline2");
        assert_eq!(drain(&mut rx), vec![SseEvent::named("note", "line1\nline2")]);
    }

    #[test]
    #[should_panic(expected = "must not contain carriage returns")]
    fn test_carriage_return_in_data_panics() {
        server_service().push_event("note", "line1\r\nline2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_push_order_holds_while_subscribers_connect() {
        const PUSHES: u64 = 500;
        let service = Arc::new(server_service());

        let pusher = tokio::spawn({
            let service = Arc::clone(&service);
            async move {
                for n in 0..PUSHES {
                    service.push_event("seq", n.to_string());
                    if n % 25 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }
        });
        let subscribers: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    service.subscribe()
                })
            })
            .collect();

        let mut receivers = Vec::new();
        for subscriber in subscribers {
            receivers.push(subscriber.await.unwrap());
        }
        pusher.await.unwrap();

        for mut rx in receivers {
            let events = drain(&mut rx);
            assert!(events[0].is_event("put"));
            let numbers: Vec<u64> = events[1..]
                .iter()
                .map(|event| {
                    assert!(event.is_event("seq"));
                    event.data.parse().unwrap()
                })
                .collect();
            for pair in numbers.windows(2) {
                assert_eq!(pair[1], pair[0] + 1, "gap or reorder in {numbers:?}");
            }
            if let Some(last) = numbers.last() {
                assert_eq!(*last, PUSHES - 1);
            }
        }
    }

    #[test]
    #[should_panic(expected = "cannot serve this dataset shape")]
    fn test_mismatched_data_panics() {
        let _ = StreamingService::new(SdkKind::ServerSide, ClientSdkData::new());
    }
}
