//! The polling simulator.

use async_trait::async_trait;
use axum::body::Body;
use fdsim_core::routes::{RouteMatch, RouteTable, polling_routes};
use fdsim_core::{ETAG_HEADER, IF_NONE_MATCH_HEADER, SdkData, SdkKind};
use fdsim_endpoints::{Request, RequestHandler, Response, status_response};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use parking_lot::RwLock;
use tracing::{debug, warn};

#[derive(Debug)]
struct PollingState {
    data: SdkData,
    etag: Option<String>,
}

/// Simulated polling service for one SDK kind.
///
/// The 304 decision depends on the ETag alone: replacing the data without
/// changing the ETag keeps answering 304 to clients holding that ETag.
#[derive(Debug)]
pub struct PollingService {
    kind: SdkKind,
    routes: RouteTable,
    state: RwLock<PollingState>,
}

impl PollingService {
    /// Service for `kind` serving `data` with no ETag.
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
            routes: polling_routes(kind),
            state: RwLock::new(PollingState { data, etag: None }),
        }
    }

    /// Start with an ETag.
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.state.get_mut().etag = Some(etag.into());
        self
    }

    /// SDK kind served.
    #[must_use]
    pub const fn kind(&self) -> SdkKind {
        self.kind
    }

    /// Replace the dataset. The ETag is left as is.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the shape this service's kind expects.
    pub fn set_data(&self, data: impl Into<SdkData>) {
        let data = data.into();
        check_data(self.kind, &data);
        self.state.write().data = data;
    }

    /// Replace the ETag; `None` disables conditional responses.
    pub fn set_etag(&self, etag: Option<String>) {
        self.state.write().etag = etag;
    }

    /// Replace dataset and ETag in one step.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the shape this service's kind expects.
    pub fn set_data_and_etag(&self, data: impl Into<SdkData>, etag: Option<String>) {
        let data = data.into();
        check_data(self.kind, &data);
        let mut state = self.state.write();
        state.data = data;
        state.etag = etag;
    }

    /// Snapshot of the current dataset.
    #[must_use]
    pub fn current_data(&self) -> SdkData {
        self.state.read().data.clone()
    }

    /// Current ETag.
    #[must_use]
    pub fn current_etag(&self) -> Option<String> {
        self.state.read().etag.clone()
    }

    fn respond(&self, if_none_match: Option<&str>) -> Response {
        let state = self.state.read();
        let etag = state.etag.as_deref().filter(|etag| !etag.is_empty());

        if let (Some(etag), Some(client_etag)) = (etag, if_none_match) {
            if etag == client_etag {
                debug!(kind = %self.kind, etag, "Poll not modified");
                return status_response(StatusCode::NOT_MODIFIED);
            }
        }

        let mut response = Response::new(Body::from(state.data.serialize()));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(value) = etag.and_then(|etag| HeaderValue::from_str(etag).ok()) {
            response.headers_mut().insert(ETAG_HEADER, value);
        }
        response
    }
}

fn check_data(kind: SdkKind, data: &SdkData) {
    assert!(
        data.kind_matches(kind),
        "{kind} polling cannot serve this dataset shape"
    );
}

#[async_trait]
impl RequestHandler for PollingService {
    async fn handle(&self, request: Request) -> Response {
        match self.routes.resolve(request.method(), request.uri().path()) {
            RouteMatch::Matched(_) => {}
            RouteMatch::MethodNotAllowed => return status_response(StatusCode::METHOD_NOT_ALLOWED),
            RouteMatch::NotFound => {
                warn!(kind = %self.kind, path = %request.uri().path(), "Unknown polling path");
                return status_response(StatusCode::NOT_FOUND);
            }
        }

        let if_none_match = request
            .headers()
            .get(IF_NONE_MATCH_HEADER)
            .and_then(|value| value.to_str().ok());
        self.respond(if_none_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdsim_core::routes::REPORT;
    use fdsim_core::{ClientFlag, ClientSdkData, ServerSdkData};
    use http::Method;
    use serde_json::{Value, json};

    fn poll(method: Method, path: &str, etag: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(etag) = etag {
            builder = builder.header(IF_NONE_MATCH_HEADER, etag);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn data(version: u64) -> ServerSdkData {
        ServerSdkData::new().with_flag("f", json!({"key": "f", "version": version}))
    }

    #[tokio::test]
    async fn test_conditional_get() {
        let service = PollingService::new(SdkKind::ServerSide, data(1)).with_etag("v1");

        let response = service.handle(poll(Method::GET, "/sdk/latest-all", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ETAG_HEADER], "v1");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_json(response).await["flags"]["f"]["version"], 1);

        let response = service.handle(poll(Method::GET, "/sdk/latest-all", Some("v1"))).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());

        let response = service.handle(poll(Method::GET, "/sdk/latest-all", Some("v0"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_data_without_etag_still_not_modified() {
        let service = PollingService::new(SdkKind::ServerSide, data(1)).with_etag("v1");
        service.set_data(data(2));

        let response = service.handle(poll(Method::GET, "/sdk/latest-all", Some("v1"))).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        service.set_etag(Some("v2".into()));
        let response = service.handle(poll(Method::GET, "/sdk/latest-all", Some("v1"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ETAG_HEADER], "v2");
        assert_eq!(body_json(response).await["flags"]["f"]["version"], 2);
    }

    #[tokio::test]
    async fn test_no_etag_never_not_modified() {
        let service = PollingService::new(SdkKind::ServerSide, data(1));

        let response = service.handle(poll(Method::GET, "/sdk/latest-all", Some(""))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ETAG_HEADER).is_none());

        service.set_etag(Some(String::new()));
        let response = service.handle(poll(Method::GET, "/sdk/latest-all", Some(""))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_side_routes() {
        let service = PollingService::new(
            SdkKind::JsClient,
            ClientSdkData::new().with_flag("f", ClientFlag::new(json!("on"), 3)),
        );

        let response = service
            .handle(poll(Method::GET, "/sdk/evalx/env1/contexts/eyJrZXkiOiJ1In0", None))
            .await;
        assert_eq!(body_json(response).await, json!({"f": {"value": "on", "version": 3}}));

        let response = service
            .handle(poll(REPORT.clone(), "/sdk/evalx/env1/context", None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = service
            .handle(poll(Method::POST, "/sdk/evalx/env1/context", None))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = service.handle(poll(Method::GET, "/sdk/latest-all", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_responses_never_mix_data_and_etag() {
        let service = std::sync::Arc::new(PollingService::new(SdkKind::ServerSide, data(0)).with_etag("v0"));

        let writers: Vec<_> = (0..2)
            .map(|writer| {
                let service = std::sync::Arc::clone(&service);
                tokio::spawn(async move {
                    for n in (writer..400).step_by(2) {
                        service.set_data_and_etag(data(n), Some(format!("v{n}")));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let service = std::sync::Arc::clone(&service);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let response = service.handle(poll(Method::GET, "/sdk/latest-all", None)).await;
                        let etag = response.headers()[ETAG_HEADER].to_str().unwrap().to_owned();
                        let version = body_json(response).await["flags"]["f"]["version"].clone();
                        assert_eq!(etag, format!("v{version}"));
                    }
                })
            })
            .collect();

        for task in writers.into_iter().chain(readers) {
            task.await.unwrap();
        }
    }

    #[test]
    fn test_set_data_and_etag_together() {
        let service = PollingService::new(SdkKind::ServerSide, data(1));
        service.set_data_and_etag(data(5), Some("v5".into()));
        assert_eq!(service.current_etag().as_deref(), Some("v5"));
        assert_eq!(service.current_data(), SdkData::from(data(5)));
    }
}
