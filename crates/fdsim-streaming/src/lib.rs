//! fdsim Streaming - server-sent event simulator for flag delivery SDKs
//!
//! - [`StreamingService`]: serves a `put` replay then live events to each subscriber
//! - [`put_event`] / [`patch_event`] / [`delete_event`]: wire payloads per SDK kind
//! - [`SseClient`] / [`SseParser`]: the reading side, for tests that act as the SDK
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fdsim_core::{DataNamespace, SdkKind, ServerSdkData};
//! use fdsim_streaming::{SseClient, StreamingService};
//!
//! let stream = Arc::new(StreamingService::new(SdkKind::ServerSide, ServerSdkData::new()));
//! let endpoint = server.registry().create(Arc::clone(&stream), Default::default());
//!
//! let mut events = SseClient::new(format!("{}/all", endpoint.address())).connect().await?;
//! let put = events.next_event(Duration::from_secs(5)).await?;
//!
//! stream.push_update(DataNamespace::Flags, "flag1", 2, serde_json::json!({"on": true}));
//! let patch = events.next_event(Duration::from_secs(5)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod payload;
mod service;
mod sse;

pub use error::*;
pub use payload::*;
pub use service::*;
pub use sse::*;
