//! Authoritative datasets served by the simulators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DataNamespace, SdkKind};

/// Flag and segment definitions as served to server-side SDKs.
///
/// Items are kept in key order so serialized payloads are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSdkData {
    /// Flag definitions by key.
    #[serde(default)]
    pub flags: BTreeMap<String, Value>,
    /// Segment definitions by key.
    #[serde(default)]
    pub segments: BTreeMap<String, Value>,
}

impl ServerSdkData {
    /// Create an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a flag definition.
    #[must_use]
    pub fn with_flag(mut self, key: impl Into<String>, flag: Value) -> Self {
        self.flags.insert(key.into(), flag);
        self
    }

    /// Add or replace a segment definition.
    #[must_use]
    pub fn with_segment(mut self, key: impl Into<String>, segment: Value) -> Self {
        self.segments.insert(key.into(), segment);
        self
    }

    /// Items of one namespace.
    #[must_use]
    pub const fn namespace(&self, namespace: DataNamespace) -> &BTreeMap<String, Value> {
        match namespace {
            DataNamespace::Flags => &self.flags,
            DataNamespace::Segments => &self.segments,
        }
    }
}

/// A pre-evaluated flag result as served to client-side SDKs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFlag {
    /// Evaluated value.
    pub value: Value,
    /// Index of the selected variation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<i64>,
    /// Version of this evaluation result.
    #[serde(default)]
    pub version: u64,
    /// Version of the flag definition that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_version: Option<u64>,
    /// Evaluation reason, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Value>,
    /// Whether full events are tracked for this flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub track_events: bool,
    /// Whether the reason should be included in events.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub track_reason: bool,
    /// Debug-event cutoff, in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_events_until_date: Option<u64>,
}

impl ClientFlag {
    /// Create a result with the given value and version.
    #[must_use]
    pub fn new(value: Value, version: u64) -> Self {
        Self {
            value,
            version,
            ..Self::default()
        }
    }

    /// Set the variation index.
    #[must_use]
    pub const fn with_variation(mut self, variation: i64) -> Self {
        self.variation = Some(variation);
        self
    }

    /// Set the evaluation reason.
    #[must_use]
    pub fn with_reason(mut self, reason: Value) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// Evaluated flag results as served to client-side SDKs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSdkData {
    /// Flag results by key.
    pub flags: BTreeMap<String, ClientFlag>,
}

impl ClientSdkData {
    /// Create an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a flag result.
    #[must_use]
    pub fn with_flag(mut self, key: impl Into<String>, flag: ClientFlag) -> Self {
        self.flags.insert(key.into(), flag);
        self
    }
}

/// The full dataset a simulator replays to new clients.
#[derive(Debug, Clone, PartialEq)]
pub enum SdkData {
    /// Server-side definitions.
    Server(ServerSdkData),
    /// Client-side evaluation results.
    Client(ClientSdkData),
}

impl SdkData {
    /// Empty dataset of the shape expected by `kind`.
    #[must_use]
    pub fn empty_for(kind: SdkKind) -> Self {
        if kind.is_client_side() {
            Self::Client(ClientSdkData::new())
        } else {
            Self::Server(ServerSdkData::new())
        }
    }

    /// Whether this dataset has the shape `kind` expects.
    #[must_use]
    pub const fn kind_matches(&self, kind: SdkKind) -> bool {
        matches!(
            (self, kind),
            (Self::Server(_), SdkKind::ServerSide)
                | (Self::Client(_), SdkKind::Mobile | SdkKind::JsClient)
        )
    }

    /// JSON value of the whole dataset, as used in polling bodies and full replays.
    #[must_use]
    pub fn to_json(&self) -> Value {
        // Both shapes are plain maps of JSON values; serialization cannot fail.
        let result = match self {
            Self::Server(data) => serde_json::to_value(data),
            Self::Client(data) => serde_json::to_value(data),
        };
        result.unwrap_or(Value::Null)
    }

    /// Serialized dataset bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}

impl From<ServerSdkData> for SdkData {
    fn from(data: ServerSdkData) -> Self {
        Self::Server(data)
    }
}

impl From<ClientSdkData> for SdkData {
    fn from(data: ClientSdkData) -> Self {
        Self::Client(data)
    }
}
