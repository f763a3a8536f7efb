//! One mock service per test, with helpers to mount each simulator.

use std::sync::Arc;

use fdsim_core::{MockServiceConfig, SdkData, SdkKind};
use fdsim_endpoints::{
    EndpointOptions, EndpointResult, MockEndpoint, MockServer, RequestHandler,
};
use fdsim_events::EventsService;
use fdsim_polling::PollingService;
use fdsim_streaming::StreamingService;
use tracing::info;

/// A simulator mounted on its own endpoint.
///
/// The test keeps `service` to drive the simulator and `endpoint` to give
/// the SDK its URL and to inspect raw requests.
#[derive(Debug)]
pub struct Mounted<S> {
    /// The simulator.
    pub service: Arc<S>,
    /// The endpoint serving it.
    pub endpoint: MockEndpoint,
}

impl<S> Mounted<S> {
    /// Base URL to configure in the SDK.
    #[must_use]
    pub fn address(&self) -> &str {
        self.endpoint.address()
    }

    /// URL of `path` below this endpoint.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint.address())
    }
}

/// A running mock service and its configuration.
#[derive(Debug)]
pub struct MockServiceHarness {
    server: MockServer,
    config: MockServiceConfig,
}

impl MockServiceHarness {
    /// Start on an ephemeral local port with default limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> EndpointResult<Self> {
        Self::start_with_config(MockServiceConfig::default()).await
    }

    /// Start with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the listener cannot be bound.
    pub async fn start_with_config(config: MockServiceConfig) -> EndpointResult<Self> {
        let server = MockServer::start(config.clone()).await?;
        info!(base_url = %server.base_url(), "Test harness ready");
        Ok(Self { server, config })
    }

    /// The underlying server.
    #[must_use]
    pub const fn server(&self) -> &MockServer {
        &self.server
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &MockServiceConfig {
        &self.config
    }

    /// Mount an arbitrary handler.
    pub fn endpoint<H: RequestHandler>(&self, handler: H, description: &str) -> MockEndpoint {
        self.server.registry().create(
            handler,
            EndpointOptions::new().with_description(description),
        )
    }

    /// Mount a streaming simulator for `kind`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the shape `kind` expects.
    pub fn streaming(&self, kind: SdkKind, data: impl Into<SdkData>) -> Mounted<StreamingService> {
        let mut service = StreamingService::new(kind, data);
        if let Some(interval) = self.config.stream_keepalive() {
            service = service.with_keepalive(interval);
        }
        self.mount(service, &format!("{kind} streaming"))
    }

    /// Mount a polling simulator for `kind`.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not the shape `kind` expects.
    pub fn polling(&self, kind: SdkKind, data: impl Into<SdkData>) -> Mounted<PollingService> {
        self.mount(PollingService::new(kind, data), &format!("{kind} polling"))
    }

    /// Mount an event intake sink for `kind`.
    pub fn events(&self, kind: SdkKind) -> Mounted<EventsService> {
        let service = EventsService::new(kind, self.config.event_batch_capacity);
        self.mount(service, &format!("{kind} events"))
    }

    fn mount<S: RequestHandler>(&self, service: S, description: &str) -> Mounted<S> {
        let service = Arc::new(service);
        let endpoint = self.endpoint(Arc::clone(&service), description);
        Mounted { service, endpoint }
    }

    /// Stop the listener and cancel in-flight requests.
    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}
