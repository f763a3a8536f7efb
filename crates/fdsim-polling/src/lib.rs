//! fdsim Polling - conditional-GET simulator for flag delivery SDKs
//!
//! [`PollingService`] answers every polling route of its SDK kind with the
//! full dataset and its ETag, or `304 Not Modified` when the client already
//! holds the current ETag.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod service;

pub use service::*;
