//! fdsim Events - analytics event intake for flag delivery SDK tests
//!
//! [`EventsService`] accepts the analytics batches an SDK posts, queues each
//! parsed batch for the test to inspect, and acknowledges diagnostic events
//! without keeping them.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fdsim_core::SdkKind;
//! use fdsim_events::EventsService;
//!
//! let events = Arc::new(EventsService::new(SdkKind::ServerSide, 100));
//! let endpoint = server.registry().create(Arc::clone(&events), Default::default());
//!
//! // configure the SDK's events URI as endpoint.address(), flush, then:
//! let batch = events.await_batch(Duration::from_secs(5)).await.expect("no events");
//! assert!(batch.events_of_kind("identify").next().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod batch;
mod error;
mod service;

pub use batch::*;
pub use error::*;
pub use service::*;
