//! Allocation and routing of virtual endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use fdsim_core::{ENDPOINT_PATH_PREFIX, MockServiceConfig};
use http::StatusCode;
use http::uri::{PathAndQuery, Uri};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::endpoint::{EndpointParams, EndpointShared};
use crate::{EndpointOptions, MockEndpoint, Request, RequestHandler, Response, status_response};

struct RegistryState {
    endpoints: HashMap<u64, Arc<EndpointShared>>,
    last_id: u64,
}

pub(crate) struct RegistryShared {
    base_url: String,
    request_queue_capacity: usize,
    max_body_bytes: usize,
    root: CancellationToken,
    state: Mutex<RegistryState>,
}

impl RegistryShared {
    pub(crate) fn remove(&self, id: u64) -> bool {
        self.state.lock().endpoints.remove(&id).is_some()
    }
}

/// Maps endpoint ids to live endpoints.
///
/// Cheap to clone; every clone refers to the same set of endpoints.
#[derive(Clone)]
pub struct EndpointRegistry {
    shared: Arc<RegistryShared>,
}

impl EndpointRegistry {
    /// Registry with default queue limits whose endpoints live under `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, &MockServiceConfig::default())
    }

    /// Registry using the queue and body limits from `config`.
    #[must_use]
    pub fn with_config(base_url: impl Into<String>, config: &MockServiceConfig) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            shared: Arc::new(RegistryShared {
                base_url,
                request_queue_capacity: config.request_queue_capacity,
                max_body_bytes: config.max_body_bytes,
                root: CancellationToken::new(),
                state: Mutex::new(RegistryState {
                    endpoints: HashMap::new(),
                    last_id: 0,
                }),
            }),
        }
    }

    /// Register a new endpoint backed by `handler`.
    ///
    /// Ids increase monotonically and are never reused, even after close.
    pub fn create<H: RequestHandler>(&self, handler: H, options: EndpointOptions) -> MockEndpoint {
        let mut state = self.shared.state.lock();
        state.last_id += 1;
        let id = state.last_id;

        let address = format!("{}{ENDPOINT_PATH_PREFIX}{id}", self.shared.base_url);
        let params = EndpointParams {
            id,
            address,
            queue_capacity: self.shared.request_queue_capacity,
            max_body_bytes: self.shared.max_body_bytes,
            root: self.shared.root.child_token(),
            registry: Arc::downgrade(&self.shared),
        };
        let endpoint = Arc::new(EndpointShared::new(params, Arc::new(handler), options));
        state.endpoints.insert(id, Arc::clone(&endpoint));
        drop(state);

        let endpoint = MockEndpoint::new(endpoint);
        debug!(endpoint = %endpoint.label(), "Created endpoint");
        endpoint
    }

    /// Route a request on the shared listener to the endpoint it names.
    ///
    /// `/endpoints/{id}/rest?q` reaches endpoint `id` as `/rest?q`, and
    /// `/endpoints/{id}` as `/`. Anything else is answered with 404.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let path = request.uri().path().to_owned();

        let Some(rest) = path.strip_prefix(ENDPOINT_PATH_PREFIX) else {
            warn!(method = %request.method(), path = %path, "Request to unrecognized path");
            return status_response(StatusCode::NOT_FOUND);
        };

        let (id_text, sub_path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, "/"),
        };

        let endpoint = parse_endpoint_id(id_text)
            .and_then(|id| self.shared.state.lock().endpoints.get(&id).cloned());
        let Some(endpoint) = endpoint else {
            warn!(method = %request.method(), path = %path, "Request to unrecognized endpoint");
            return status_response(StatusCode::NOT_FOUND);
        };

        let path_and_query = match request.uri().query() {
            Some(query) => format!("{sub_path}?{query}"),
            None => sub_path.to_owned(),
        };
        let Ok(path_and_query) = PathAndQuery::try_from(path_and_query) else {
            return status_response(StatusCode::BAD_REQUEST);
        };
        let mut parts = request.uri().clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        let Ok(uri) = Uri::from_parts(parts) else {
            return status_response(StatusCode::BAD_REQUEST);
        };
        *request.uri_mut() = uri;

        endpoint.serve(request).await
    }

    /// Deregister endpoint `id` without closing it. Returns whether it was present.
    pub fn remove(&self, id: u64) -> bool {
        self.shared.remove(id)
    }

    /// Whether endpoint `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.shared.state.lock().endpoints.contains_key(&id)
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().endpoints.len()
    }

    /// Whether no endpoints are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Base URL endpoints are addressed under.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.shared.base_url
    }

    /// Cancel every in-flight request on every endpoint.
    pub fn shutdown(&self) {
        self.shared.root.cancel();
        debug!(endpoints = self.len(), "Shut down endpoint registry");
    }

    pub(crate) fn root_token(&self) -> CancellationToken {
        self.shared.root.clone()
    }
}

/// Canonical decimal id: ASCII digits only, no sign, no leading zero.
fn parse_endpoint_id(text: &str) -> Option<u64> {
    if text.is_empty() || text.starts_with('0') || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("base_url", &self.shared.base_url)
            .field("endpoints", &self.len())
            .finish_non_exhaustive()
    }
}
