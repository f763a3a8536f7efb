//! Flag and segment fixtures.

use fdsim_core::{ClientFlag, ClientSdkData, ServerSdkData};
use serde_json::{Value, json};

// ─────────────────────────────────────────────────────────────────────────────
// Server-side definitions
// ─────────────────────────────────────────────────────────────────────────────

/// A boolean flag definition that is on and serves `true`.
#[must_use]
pub fn boolean_flag(key: &str, version: u64) -> Value {
    json!({
        "key": key,
        "version": version,
        "on": true,
        "variations": [true, false],
        "fallthrough": {"variation": 0},
        "offVariation": 1,
        "targets": [],
        "rules": [],
        "prerequisites": [],
        "salt": key,
    })
}

/// A segment definition that includes `included` context keys.
#[must_use]
pub fn segment(key: &str, version: u64, included: &[&str]) -> Value {
    json!({
        "key": key,
        "version": version,
        "included": included,
        "excluded": [],
        "rules": [],
        "salt": key,
    })
}

/// Server dataset with one boolean flag per key, all at `version`.
#[must_use]
pub fn server_data(flag_keys: &[&str], version: u64) -> ServerSdkData {
    flag_keys.iter().fold(ServerSdkData::new(), |data, key| {
        data.with_flag(*key, boolean_flag(key, version))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Client-side results
// ─────────────────────────────────────────────────────────────────────────────

/// An evaluated flag result with a fallthrough reason.
#[must_use]
pub fn client_flag(value: Value, version: u64) -> ClientFlag {
    ClientFlag::new(value, version)
        .with_variation(0)
        .with_reason(json!({"kind": "FALLTHROUGH"}))
}

/// Client dataset from `(key, value)` pairs, all at `version`.
#[must_use]
pub fn client_data(flags: &[(&str, Value)], version: u64) -> ClientSdkData {
    flags.iter().fold(ClientSdkData::new(), |data, (key, value)| {
        data.with_flag(*key, client_flag(value.clone(), version))
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Analytics
// ─────────────────────────────────────────────────────────────────────────────

/// A minimal identify event.
#[must_use]
pub fn identify_event(context_key: &str) -> Value {
    json!({
        "kind": "identify",
        "creationDate": 1_700_000_000_000_u64,
        "context": {"kind": "user", "key": context_key},
    })
}
