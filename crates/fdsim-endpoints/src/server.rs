//! The physical listener shared by all virtual endpoints.

use std::net::SocketAddr;

use axum::Router;
use fdsim_core::MockServiceConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{EndpointError, EndpointRegistry, EndpointResult, Request};

/// A running mock service.
///
/// Dropping the server stops accepting connections and cancels every
/// in-flight request.
pub struct MockServer {
    registry: EndpointRegistry,
    local_addr: SocketAddr,
    task: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Bind the listener and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address cannot be bound.
    pub async fn start(config: MockServiceConfig) -> EndpointResult<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_address)
            .await
            .map_err(|source| EndpointError::Bind {
                address: config.bind_address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| EndpointError::Bind {
            address: config.bind_address.clone(),
            source,
        })?;

        let base_url = config
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{local_addr}"));
        let registry = EndpointRegistry::with_config(base_url, &config);

        let dispatcher = registry.clone();
        let app = Router::new().fallback(move |request: Request| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(request).await }
        });

        let shutdown = registry.root_token();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(err) = result {
                error!(error = %err, "Mock service listener failed");
            }
        });

        info!(address = %local_addr, base_url = %registry.base_url(), "Mock service started");

        Ok(Self {
            registry,
            local_addr,
            task: Some(task),
        })
    }

    /// Base URL endpoint addresses are built from.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.registry.base_url()
    }

    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Registry for creating endpoints on this server.
    #[must_use]
    pub const fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Cancel in-flight requests and wait for the listener to stop.
    pub async fn shutdown(mut self) {
        self.registry.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(error = %err, "Mock service task ended abnormally");
            }
        }
        info!(address = %self.local_addr, "Mock service stopped");
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.registry.shutdown();
        }
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("local_addr", &self.local_addr)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
