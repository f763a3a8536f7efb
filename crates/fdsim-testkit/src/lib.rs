//! fdsim Test Kit - helpers for tests against the flag delivery mock service
//!
//! - [`MockServiceHarness`] - starts a [`fdsim_endpoints::MockServer`] and mounts simulators
//! - [`PanicTestScope`] - [`fdsim_endpoints::TestScope`] for Rust test functions
//! - [`fixtures`] - flag, segment and event payloads
//! - assertion helpers for stream events and recorded requests
//! - tracing configuration for test output
//!
//! # Example
//!
//! ```rust,ignore
//! use fdsim_core::SdkKind;
//! use fdsim_testkit::{MockServiceHarness, fixtures};
//!
//! #[tokio::test]
//! async fn test_sdk_polls() {
//!     fdsim_testkit::init_test_tracing();
//!
//!     let harness = MockServiceHarness::start().await.unwrap();
//!     let polling = harness.polling(SdkKind::ServerSide, fixtures::server_data(&["flag1"], 1));
//!
//!     // point the SDK's base URI at polling.address(), then:
//!     let scope = fdsim_testkit::PanicTestScope::new();
//!     let request = polling.endpoint.require_request(&scope, Duration::from_secs(5)).await;
//!     assert_eq!(request.path(), "/sdk/latest-all");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod assertions;
pub mod fixtures;
mod harness;
mod scope;
mod tracing_config;

pub use assertions::*;
pub use harness::*;
pub use scope::*;
pub use tracing_config::*;

pub use fdsim_core::{MockServiceConfig, SdkKind};
