//! fdsim Endpoints - virtual HTTP endpoints for SDK conformance tests
//!
//! Many test-scoped endpoints share one physical listener. Each endpoint is
//! addressed as `{base}/endpoints/{id}`, forwards the remainder of the path to
//! its own [`RequestHandler`], and records what it received so tests can
//! assert on the SDK's wire behavior.
//!
//! - [`MockServer`] - the physical listener
//! - [`EndpointRegistry`] - allocates ids and routes requests to endpoints
//! - [`MockEndpoint`] - one virtual endpoint; closing it aborts in-flight requests
//! - [`RequestScope`] - per-request cancellation visible to handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use fdsim_endpoints::{EndpointOptions, MockServer, StaticResponse};
//!
//! let server = MockServer::start(Default::default()).await?;
//! let endpoint = server.registry().create(
//!     StaticResponse::json(&serde_json::json!({"ok": true})),
//!     EndpointOptions::new().with_description("status check"),
//! );
//!
//! // point the SDK at endpoint.address(), then:
//! let request = endpoint.await_request(Duration::from_secs(5)).await?;
//! assert_eq!(request.path(), "/");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod endpoint;
mod error;
mod handler;
mod registry;
mod require;
mod scope;
mod server;

pub use endpoint::*;
pub use error::*;
pub use handler::*;
pub use registry::*;
pub use require::*;
pub use scope::*;
pub use server::*;

/// Request type accepted by handlers.
pub use axum::extract::Request;
/// Response type produced by handlers.
pub use axum::response::Response;
