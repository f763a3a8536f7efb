//! SDK families and data namespaces.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The family of SDK a simulator is serving.
///
/// Server-side SDKs receive raw flag and segment definitions; client-side
/// SDKs (mobile and JavaScript) receive pre-evaluated flag results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SdkKind {
    /// Server-side SDK.
    ServerSide,
    /// Mobile client-side SDK.
    Mobile,
    /// JavaScript browser client-side SDK.
    JsClient,
}

impl SdkKind {
    /// Whether this kind receives evaluated flag results instead of definitions.
    #[must_use]
    pub const fn is_client_side(self) -> bool {
        matches!(self, Self::Mobile | Self::JsClient)
    }

    /// Stable string form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerSide => "server-side",
            Self::Mobile => "mobile",
            Self::JsClient => "js-client",
        }
    }
}

impl fmt::Display for SdkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of item addressed by a streaming patch or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataNamespace {
    /// Feature flags.
    Flags,
    /// User/context segments (server-side only).
    Segments,
}

impl DataNamespace {
    /// Path component used in stream payloads (`/flags/<key>`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flags => "flags",
            Self::Segments => "segments",
        }
    }
}

impl fmt::Display for DataNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
