//! fdsim Core - shared types for the flag delivery mock service
//!
//! This crate holds everything the mock endpoints and protocol simulators
//! agree on:
//!
//! - [`SdkKind`] and [`DataNamespace`] - which SDK family a simulator serves
//! - [`SdkData`] - the authoritative dataset served by streaming and polling
//! - [`routes`] - per-kind path tables for streaming, polling and event intake
//! - [`MockServiceConfig`] - listener and queue configuration
//!
//! # Example
//!
//! ```rust
//! use fdsim_core::{SdkData, SdkKind, ServerSdkData};
//!
//! let data = ServerSdkData::new()
//!     .with_flag("flag1", serde_json::json!({"key": "flag1", "version": 1}));
//! let data = SdkData::from(data);
//! assert!(data.kind_matches(SdkKind::ServerSide));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod data;
mod error;
mod kind;
pub mod routes;

pub use config::*;
pub use data::*;
pub use error::*;
pub use kind::*;

/// Path prefix under which every virtual endpoint is addressed.
pub const ENDPOINT_PATH_PREFIX: &str = "/endpoints/";

/// Request header carrying the client's cache validator.
pub const IF_NONE_MATCH_HEADER: &str = "if-none-match";

/// Response header carrying the current cache validator.
pub const ETAG_HEADER: &str = "etag";
